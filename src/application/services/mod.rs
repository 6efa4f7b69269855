//! Application Services - 面向生成后端的用例服务
//!
//! 包含：
//! - GenerationClient: 规范化请求并提交，回复封装为结构化结果
//! - BackendCatalog: 后端选项与可枚举资源（含 ControlNet）
//! - ModelResolver: 模型名称解析（精确/模糊）并切换模型
//! - ReadinessPoller: 轮询后端直到空闲

mod backend_catalog;
mod generation_client;
mod model_resolver;
mod readiness_poller;

pub use backend_catalog::BackendCatalog;
pub use generation_client::GenerationClient;
pub use model_resolver::ModelResolver;
pub use readiness_poller::{ReadinessPoller, ReadinessPollerConfig};
