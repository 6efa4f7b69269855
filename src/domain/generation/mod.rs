//! Generation Context - 生成请求限界上下文
//!
//! 职责:
//! - 调用方选项与默认值合并（请求规范化）
//! - ControlNet 条件单元编码
//! - 后端回复解码为结构化结果
//! - 进度快照与后端目录类型

mod catalog;
mod controlnet;
mod errors;
mod options;
mod payload;
mod progress;
mod result;

pub use catalog::{
    BackendModel, BackendOptions, FaceRestorer, Hypernetwork, PromptStyle, RealesrganModel,
    Sampler, Upscaler,
};
pub use controlnet::{
    encode_units, ConditioningUnit, ControlNetDetectOptions, ControlNetDetectPayload,
    ControlNetUnitPayload,
};
pub use errors::GenerationError;
pub use options::{
    ExtraBatchOptions, ExtraSingleOptions, ExtrasOptions, GenerationRequest, Img2ImgOptions,
    InterrogateOptions, PngInfoOptions, SamplingOptions, Txt2ImgOptions,
};
pub use payload::{
    merge_alwayson_scripts, GenerationDefaults, GenerationEndpoint, NormalizedPayload,
    RequestNormalizer, CONTROLNET_SCRIPT,
};
pub use progress::{JobState, ProgressState};
pub use result::GenerationResult;
