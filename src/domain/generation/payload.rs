//! Request Normalizer - 生成请求的规范化
//!
//! 把调用方的可选参数与默认值合并为完整的后端请求体。
//! 每个字段的默认值只在本文件中声明一次；序列化后的请求体
//! 包含全部字段，未提供的可选字段以默认值（或 null）出现。

use serde::Serialize;
use serde_json::{Map, Value};

use super::controlnet::{encode_units, ControlNetDetectOptions, ControlNetUnitPayload};
use super::options::*;
use super::GenerationError;
use crate::domain::image::ImageCodec;

/// 扩展脚本中 ControlNet 条目的名称
pub const CONTROLNET_SCRIPT: &str = "ControlNet";

/// 后端生成类接口
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationEndpoint {
    Txt2Img,
    Img2Img,
    ExtraSingleImage,
    ExtraBatchImages,
    PngInfo,
    Interrogate,
    ControlNetDetect,
}

impl GenerationEndpoint {
    pub fn path(&self) -> &'static str {
        match self {
            GenerationEndpoint::Txt2Img => "/sdapi/v1/txt2img",
            GenerationEndpoint::Img2Img => "/sdapi/v1/img2img",
            GenerationEndpoint::ExtraSingleImage => "/sdapi/v1/extra-single-image",
            GenerationEndpoint::ExtraBatchImages => "/sdapi/v1/extra-batch-images",
            GenerationEndpoint::PngInfo => "/sdapi/v1/png-info",
            GenerationEndpoint::Interrogate => "/sdapi/v1/interrogate",
            GenerationEndpoint::ControlNetDetect => "/controlnet/detect",
        }
    }
}

/// 由配置决定的默认值（采样器与步数）
#[derive(Debug, Clone)]
pub struct GenerationDefaults {
    pub sampler_name: String,
    pub steps: u32,
}

impl Default for GenerationDefaults {
    fn default() -> Self {
        Self {
            sampler_name: "Euler a".to_string(),
            steps: 20,
        }
    }
}

/// 规范化结果: 目标接口 + 完整请求体
#[derive(Debug, Clone)]
pub struct NormalizedPayload {
    pub endpoint: GenerationEndpoint,
    pub body: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SamplingPayload {
    pub prompt: String,
    pub negative_prompt: String,
    pub styles: Vec<String>,
    pub seed: i64,
    pub subseed: i64,
    pub subseed_strength: f64,
    pub seed_resize_from_h: i64,
    pub seed_resize_from_w: i64,
    pub sampler_name: String,
    pub batch_size: u32,
    pub n_iter: u32,
    pub steps: u32,
    pub cfg_scale: f64,
    pub width: u32,
    pub height: u32,
    pub restore_faces: bool,
    pub tiling: bool,
    pub do_not_save_samples: bool,
    pub do_not_save_grid: bool,
    pub eta: f64,
    pub s_churn: f64,
    pub s_tmax: f64,
    pub s_tmin: f64,
    pub s_noise: f64,
    pub override_settings: Map<String, Value>,
    pub override_settings_restore_afterwards: bool,
    pub script_args: Vec<Value>,
    pub script_name: Option<String>,
    pub send_images: bool,
    pub save_images: bool,
    pub use_deprecated_controlnet: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Txt2ImgPayload {
    pub enable_hr: bool,
    pub hr_scale: f64,
    pub hr_upscaler: String,
    pub hr_second_pass_steps: u32,
    pub hr_resize_x: u32,
    pub hr_resize_y: u32,
    pub denoising_strength: f64,
    pub firstphase_width: u32,
    pub firstphase_height: u32,
    #[serde(flatten)]
    pub sampling: SamplingPayload,
    pub alwayson_scripts: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Img2ImgPayload {
    pub init_images: Vec<String>,
    pub mask: Option<String>,
    pub resize_mode: u32,
    pub denoising_strength: f64,
    pub image_cfg_scale: f64,
    pub mask_blur: u32,
    pub inpainting_fill: u32,
    pub inpaint_full_res: bool,
    pub inpaint_full_res_padding: u32,
    pub inpainting_mask_invert: u32,
    pub initial_noise_multiplier: f64,
    pub include_init_images: bool,
    #[serde(flatten)]
    pub sampling: SamplingPayload,
    pub alwayson_scripts: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtrasPayload {
    pub resize_mode: u32,
    pub show_extras_results: bool,
    pub gfpgan_visibility: f64,
    pub codeformer_weight: f64,
    pub upscaling_resize: f64,
    pub upscaling_resize_w: u32,
    pub upscaling_resize_h: u32,
    pub upscaling_resize_crop: bool,
    pub upscaler_1: String,
    pub upscaler_2: String,
    pub extras_upscaler_2_visibility: f64,
    pub upscale_first: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtraSinglePayload {
    pub image: String,
    #[serde(flatten)]
    pub extras: ExtrasPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedImage {
    pub image: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtraBatchPayload {
    pub image_list: Vec<NamedImage>,
    #[serde(flatten)]
    pub extras: ExtrasPayload,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PngInfoPayload {
    pub image: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterrogatePayload {
    pub image: String,
    pub model: String,
}

impl SamplingOptions {
    fn resolve(&self, defaults: &GenerationDefaults) -> SamplingPayload {
        SamplingPayload {
            prompt: self.prompt.clone().unwrap_or_default(),
            negative_prompt: self.negative_prompt.clone().unwrap_or_default(),
            styles: self.styles.clone().unwrap_or_default(),
            seed: self.seed.unwrap_or(-1),
            subseed: self.subseed.unwrap_or(-1),
            subseed_strength: self.subseed_strength.unwrap_or(0.0),
            seed_resize_from_h: self.seed_resize_from_h.unwrap_or(0),
            seed_resize_from_w: self.seed_resize_from_w.unwrap_or(0),
            sampler_name: self
                .sampler_name
                .clone()
                .unwrap_or_else(|| defaults.sampler_name.clone()),
            batch_size: self.batch_size.unwrap_or(1),
            n_iter: self.n_iter.unwrap_or(1),
            steps: self.steps.unwrap_or(defaults.steps),
            cfg_scale: self.cfg_scale.unwrap_or(7.0),
            width: self.width.unwrap_or(512),
            height: self.height.unwrap_or(512),
            restore_faces: self.restore_faces.unwrap_or(false),
            tiling: self.tiling.unwrap_or(false),
            do_not_save_samples: self.do_not_save_samples.unwrap_or(false),
            do_not_save_grid: self.do_not_save_grid.unwrap_or(false),
            eta: self.eta.unwrap_or(1.0),
            s_churn: self.s_churn.unwrap_or(0.0),
            s_tmax: self.s_tmax.unwrap_or(0.0),
            s_tmin: self.s_tmin.unwrap_or(0.0),
            s_noise: self.s_noise.unwrap_or(1.0),
            override_settings: self.override_settings.clone().unwrap_or_default(),
            override_settings_restore_afterwards: self
                .override_settings_restore_afterwards
                .unwrap_or(true),
            script_args: self.script_args.clone().unwrap_or_default(),
            script_name: self.script_name.clone(),
            send_images: self.send_images.unwrap_or(true),
            save_images: self.save_images.unwrap_or(false),
            use_deprecated_controlnet: self.use_deprecated_controlnet.unwrap_or(false),
        }
    }
}

impl ExtrasOptions {
    fn resolve(&self) -> ExtrasPayload {
        ExtrasPayload {
            resize_mode: self.resize_mode.unwrap_or(0),
            show_extras_results: self.show_extras_results.unwrap_or(true),
            gfpgan_visibility: self.gfpgan_visibility.unwrap_or(0.0),
            codeformer_weight: self.codeformer_weight.unwrap_or(0.0),
            upscaling_resize: self.upscaling_resize.unwrap_or(2.0),
            upscaling_resize_w: self.upscaling_resize_w.unwrap_or(512),
            upscaling_resize_h: self.upscaling_resize_h.unwrap_or(512),
            upscaling_resize_crop: self.upscaling_resize_crop.unwrap_or(true),
            upscaler_1: self.upscaler_1.clone().unwrap_or_else(|| "None".to_string()),
            upscaler_2: self.upscaler_2.clone().unwrap_or_else(|| "None".to_string()),
            extras_upscaler_2_visibility: self.extras_upscaler_2_visibility.unwrap_or(0.0),
            upscale_first: self.upscale_first.unwrap_or(false),
        }
    }
}

/// 合并扩展脚本: 调用方的条目保留，ControlNet 条目覆盖在其上
pub fn merge_alwayson_scripts(
    caller_scripts: Option<&Map<String, Value>>,
    units: Vec<ControlNetUnitPayload>,
) -> Result<Map<String, Value>, GenerationError> {
    let mut scripts = caller_scripts.cloned().unwrap_or_default();
    if !units.is_empty() {
        let args = serde_json::to_value(units)?;
        let mut entry = Map::new();
        entry.insert("args".to_string(), args);
        scripts.insert(CONTROLNET_SCRIPT.to_string(), Value::Object(entry));
    }
    Ok(scripts)
}

/// 请求规范化器
#[derive(Debug, Clone, Default)]
pub struct RequestNormalizer {
    defaults: GenerationDefaults,
}

impl RequestNormalizer {
    pub fn new(defaults: GenerationDefaults) -> Self {
        Self { defaults }
    }

    pub fn defaults(&self) -> &GenerationDefaults {
        &self.defaults
    }

    /// 校验并规范化请求
    pub async fn normalize(
        &self,
        request: &GenerationRequest,
    ) -> Result<NormalizedPayload, GenerationError> {
        request.validate()?;

        let (endpoint, body) = match request {
            GenerationRequest::TextToImage(o) => {
                (GenerationEndpoint::Txt2Img, serde_json::to_value(self.txt2img(o).await?)?)
            }
            GenerationRequest::ImageToImage(o) => {
                (GenerationEndpoint::Img2Img, serde_json::to_value(self.img2img(o).await?)?)
            }
            GenerationRequest::RestoreSingle(o) => (
                GenerationEndpoint::ExtraSingleImage,
                serde_json::to_value(self.extra_single(o).await?)?,
            ),
            GenerationRequest::RestoreBatch(o) => (
                GenerationEndpoint::ExtraBatchImages,
                serde_json::to_value(self.extra_batch(o).await?)?,
            ),
            GenerationRequest::MetadataQuery(o) => (
                GenerationEndpoint::PngInfo,
                serde_json::to_value(PngInfoPayload {
                    image: ImageCodec::encode(&o.image).await?,
                })?,
            ),
            GenerationRequest::Interrogate(o) => (
                GenerationEndpoint::Interrogate,
                serde_json::to_value(InterrogatePayload {
                    image: ImageCodec::encode(&o.image).await?,
                    model: o.model.clone().unwrap_or_else(|| "clip".to_string()),
                })?,
            ),
        };

        Ok(NormalizedPayload { endpoint, body })
    }

    pub async fn txt2img(&self, o: &Txt2ImgOptions) -> Result<Txt2ImgPayload, GenerationError> {
        let units = encode_units(&o.controlnet_units).await?;
        let alwayson_scripts = merge_alwayson_scripts(o.alwayson_scripts.as_ref(), units)?;

        Ok(Txt2ImgPayload {
            enable_hr: o.enable_hr.unwrap_or(false),
            hr_scale: o.hr_scale.unwrap_or(2.0),
            hr_upscaler: o.hr_upscaler.clone().unwrap_or_else(|| "Latent".to_string()),
            hr_second_pass_steps: o.hr_second_pass_steps.unwrap_or(0),
            hr_resize_x: o.hr_resize_x.unwrap_or(0),
            hr_resize_y: o.hr_resize_y.unwrap_or(0),
            denoising_strength: o.denoising_strength.unwrap_or(0.7),
            firstphase_width: o.firstphase_width.unwrap_or(0),
            firstphase_height: o.firstphase_height.unwrap_or(0),
            sampling: o.sampling.resolve(&self.defaults),
            alwayson_scripts,
        })
    }

    pub async fn img2img(&self, o: &Img2ImgOptions) -> Result<Img2ImgPayload, GenerationError> {
        // 初始图像、蒙版与控制单元之间没有依赖，并发编码
        let (init_images, mask, units) = tokio::try_join!(
            async { ImageCodec::encode_all(&o.init_images).await.map_err(GenerationError::from) },
            async {
                ImageCodec::encode_optional(o.mask_image.as_ref())
                    .await
                    .map_err(GenerationError::from)
            },
            encode_units(&o.controlnet_units),
        )?;
        let alwayson_scripts = merge_alwayson_scripts(o.alwayson_scripts.as_ref(), units)?;

        Ok(Img2ImgPayload {
            init_images,
            mask,
            resize_mode: o.resize_mode.unwrap_or(0),
            denoising_strength: o.denoising_strength.unwrap_or(0.75),
            image_cfg_scale: o.image_cfg_scale.unwrap_or(1.5),
            mask_blur: o.mask_blur.unwrap_or(4),
            inpainting_fill: o.inpainting_fill.unwrap_or(0),
            inpaint_full_res: o.inpaint_full_res.unwrap_or(true),
            inpaint_full_res_padding: o.inpaint_full_res_padding.unwrap_or(0),
            inpainting_mask_invert: o.inpainting_mask_invert.unwrap_or(0),
            initial_noise_multiplier: o.initial_noise_multiplier.unwrap_or(1.0),
            include_init_images: o.include_init_images.unwrap_or(false),
            sampling: o.sampling.resolve(&self.defaults),
            alwayson_scripts,
        })
    }

    pub async fn extra_single(
        &self,
        o: &ExtraSingleOptions,
    ) -> Result<ExtraSinglePayload, GenerationError> {
        Ok(ExtraSinglePayload {
            image: ImageCodec::encode(&o.image).await?,
            extras: o.extras.resolve(),
        })
    }

    pub async fn extra_batch(
        &self,
        o: &ExtraBatchOptions,
    ) -> Result<ExtraBatchPayload, GenerationError> {
        if o.images.len() != o.name_list.len() {
            return Err(GenerationError::Validation(format!(
                "The number of images ({}) and names ({}) must be the same in a batch restore",
                o.images.len(),
                o.name_list.len()
            )));
        }

        let encoded = ImageCodec::encode_all(&o.images).await?;
        let image_list = encoded
            .into_iter()
            .zip(o.name_list.iter())
            .map(|(image, name)| NamedImage {
                image,
                name: name.clone(),
            })
            .collect();

        Ok(ExtraBatchPayload {
            image_list,
            extras: o.extras.resolve(),
        })
    }

    pub async fn controlnet_detect(
        &self,
        o: &ControlNetDetectOptions,
    ) -> Result<NormalizedPayload, GenerationError> {
        Ok(NormalizedPayload {
            endpoint: GenerationEndpoint::ControlNetDetect,
            body: serde_json::to_value(o.into_payload().await?)?,
        })
    }
}
