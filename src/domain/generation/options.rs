//! Generation Options - 调用方提供的（可选）请求参数
//!
//! 所有字段都是可选的，缺省值统一在 `payload` 模块中填充。

use futures_util::future::try_join_all;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{ConditioningUnit, GenerationError};
use crate::domain::image::{CodecError, ImageCodec, ImageHandle};

/// txt2img / img2img 共享的采样参数
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SamplingOptions {
    pub prompt: Option<String>,
    pub negative_prompt: Option<String>,
    pub styles: Option<Vec<String>>,
    pub seed: Option<i64>,
    pub subseed: Option<i64>,
    pub subseed_strength: Option<f64>,
    pub seed_resize_from_h: Option<i64>,
    pub seed_resize_from_w: Option<i64>,
    pub sampler_name: Option<String>,
    pub batch_size: Option<u32>,
    pub n_iter: Option<u32>,
    pub steps: Option<u32>,
    pub cfg_scale: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub restore_faces: Option<bool>,
    pub tiling: Option<bool>,
    pub do_not_save_samples: Option<bool>,
    pub do_not_save_grid: Option<bool>,
    pub eta: Option<f64>,
    pub s_churn: Option<f64>,
    pub s_tmax: Option<f64>,
    pub s_tmin: Option<f64>,
    pub s_noise: Option<f64>,
    pub override_settings: Option<Map<String, Value>>,
    pub override_settings_restore_afterwards: Option<bool>,
    pub script_args: Option<Vec<Value>>,
    pub script_name: Option<String>,
    pub send_images: Option<bool>,
    pub save_images: Option<bool>,
    pub use_deprecated_controlnet: Option<bool>,
}

/// 文生图参数
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Txt2ImgOptions {
    pub enable_hr: Option<bool>,
    pub hr_scale: Option<f64>,
    pub hr_upscaler: Option<String>,
    pub hr_second_pass_steps: Option<u32>,
    pub hr_resize_x: Option<u32>,
    pub hr_resize_y: Option<u32>,
    pub denoising_strength: Option<f64>,
    pub firstphase_width: Option<u32>,
    pub firstphase_height: Option<u32>,
    #[serde(flatten)]
    pub sampling: SamplingOptions,
    pub alwayson_scripts: Option<Map<String, Value>>,
    #[serde(default)]
    pub controlnet_units: Vec<ConditioningUnit>,
}

/// 图生图参数
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Img2ImgOptions {
    #[serde(default)]
    pub init_images: Vec<ImageHandle>,
    pub mask_image: Option<ImageHandle>,
    pub resize_mode: Option<u32>,
    pub denoising_strength: Option<f64>,
    pub image_cfg_scale: Option<f64>,
    pub mask_blur: Option<u32>,
    pub inpainting_fill: Option<u32>,
    pub inpaint_full_res: Option<bool>,
    pub inpaint_full_res_padding: Option<u32>,
    pub inpainting_mask_invert: Option<u32>,
    pub initial_noise_multiplier: Option<f64>,
    pub include_init_images: Option<bool>,
    #[serde(flatten)]
    pub sampling: SamplingOptions,
    pub alwayson_scripts: Option<Map<String, Value>>,
    #[serde(default)]
    pub controlnet_units: Vec<ConditioningUnit>,
}

/// 后处理（修复/放大）共享参数
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtrasOptions {
    pub resize_mode: Option<u32>,
    pub show_extras_results: Option<bool>,
    pub gfpgan_visibility: Option<f64>,
    pub codeformer_weight: Option<f64>,
    pub upscaling_resize: Option<f64>,
    pub upscaling_resize_w: Option<u32>,
    pub upscaling_resize_h: Option<u32>,
    pub upscaling_resize_crop: Option<bool>,
    pub upscaler_1: Option<String>,
    pub upscaler_2: Option<String>,
    pub extras_upscaler_2_visibility: Option<f64>,
    pub upscale_first: Option<bool>,
}

/// 单图修复/放大
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtraSingleOptions {
    pub image: ImageHandle,
    #[serde(flatten)]
    pub extras: ExtrasOptions,
}

/// 批量修复/放大，`images` 与 `name_list` 按位置一一对应
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtraBatchOptions {
    #[serde(default)]
    pub images: Vec<ImageHandle>,
    #[serde(default)]
    pub name_list: Vec<String>,
    #[serde(flatten)]
    pub extras: ExtrasOptions,
}

/// PNG 元数据查询
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PngInfoOptions {
    pub image: ImageHandle,
}

/// 图像反推提示词
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterrogateOptions {
    pub image: ImageHandle,
    pub model: Option<String>,
}

/// 生成请求
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "options", rename_all = "snake_case")]
pub enum GenerationRequest {
    TextToImage(Txt2ImgOptions),
    ImageToImage(Img2ImgOptions),
    RestoreSingle(ExtraSingleOptions),
    RestoreBatch(ExtraBatchOptions),
    MetadataQuery(PngInfoOptions),
    Interrogate(InterrogateOptions),
}

impl GenerationRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            GenerationRequest::TextToImage(_) => "text_to_image",
            GenerationRequest::ImageToImage(_) => "image_to_image",
            GenerationRequest::RestoreSingle(_) => "restore_single",
            GenerationRequest::RestoreBatch(_) => "restore_batch",
            GenerationRequest::MetadataQuery(_) => "metadata_query",
            GenerationRequest::Interrogate(_) => "interrogate",
        }
    }

    pub fn controlnet_units(&self) -> &[ConditioningUnit] {
        match self {
            GenerationRequest::TextToImage(o) => &o.controlnet_units,
            GenerationRequest::ImageToImage(o) => &o.controlnet_units,
            _ => &[],
        }
    }

    /// 回复中是否带有图像（png-info / interrogate 只返回文本）
    pub fn produces_images(&self) -> bool {
        !matches!(
            self,
            GenerationRequest::MetadataQuery(_) | GenerationRequest::Interrogate(_)
        )
    }

    /// 请求携带的全部图像，按字段顺序
    fn images_mut(&mut self) -> Vec<&mut ImageHandle> {
        fn units(units: &mut [ConditioningUnit]) -> impl Iterator<Item = &mut ImageHandle> {
            units
                .iter_mut()
                .flat_map(|u| std::iter::once(&mut u.input_image).chain(u.mask.as_mut()))
        }

        match self {
            GenerationRequest::TextToImage(o) => units(&mut o.controlnet_units).collect(),
            GenerationRequest::ImageToImage(o) => o
                .init_images
                .iter_mut()
                .chain(o.mask_image.as_mut())
                .chain(units(&mut o.controlnet_units))
                .collect(),
            GenerationRequest::RestoreSingle(o) => vec![&mut o.image],
            GenerationRequest::RestoreBatch(o) => o.images.iter_mut().collect(),
            GenerationRequest::MetadataQuery(o) => vec![&mut o.image],
            GenerationRequest::Interrogate(o) => vec![&mut o.image],
        }
    }

    /// 把内存中的像素图像并发编码为传输字符串，之后请求可以序列化
    pub async fn into_transport(mut self) -> Result<Self, CodecError> {
        let mut images = self.images_mut();
        let pending: Vec<ImageHandle> = images
            .iter()
            .filter(|image| !image.is_encoded())
            .map(|image| (**image).clone())
            .collect();
        if pending.is_empty() {
            drop(images);
            return Ok(self);
        }

        let mut encoded = try_join_all(pending.iter().map(ImageCodec::to_transport))
            .await?
            .into_iter();
        for image in images.iter_mut().filter(|image| !image.is_encoded()) {
            if let Some(next) = encoded.next() {
                **image = next;
            }
        }
        drop(images);
        Ok(self)
    }

    /// 发送前的同步校验，不涉及任何网络调用
    pub fn validate(&self) -> Result<(), GenerationError> {
        if let GenerationRequest::RestoreBatch(o) = self {
            if o.images.len() != o.name_list.len() {
                return Err(GenerationError::Validation(format!(
                    "The number of images ({}) and names ({}) must be the same in a batch restore",
                    o.images.len(),
                    o.name_list.len()
                )));
            }
        }
        for unit in self.controlnet_units() {
            unit.validate()?;
        }
        Ok(())
    }
}
