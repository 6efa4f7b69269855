//! ControlNet - 条件控制单元与检测请求
//!
//! 单元在后端 `alwayson_scripts.ControlNet.args` 中按位置映射，
//! 因此编码结果必须保持调用方给定的顺序。

use futures_util::future::try_join_all;
use serde::{Deserialize, Serialize};

use super::GenerationError;
use crate::domain::image::{ImageCodec, ImageHandle};

/// 条件控制单元
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConditioningUnit {
    pub input_image: ImageHandle,
    pub mask: Option<ImageHandle>,
    pub module: Option<String>,
    pub model: Option<String>,
    pub weight: Option<f64>,
    pub resize_mode: Option<String>,
    pub lowvram: Option<bool>,
    pub processor_res: Option<u32>,
    pub threshold_a: Option<f64>,
    pub threshold_b: Option<f64>,
    pub guidance: Option<f64>,
    pub guidance_start: Option<f64>,
    pub guidance_end: Option<f64>,
    pub guessmode: Option<bool>,
}

/// 编码后的单元（后端格式）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControlNetUnitPayload {
    pub input_image: String,
    pub mask: Option<String>,
    pub module: String,
    pub model: String,
    pub weight: f64,
    pub resize_mode: String,
    pub lowvram: bool,
    pub processor_res: u32,
    pub threshold_a: f64,
    pub threshold_b: f64,
    pub guidance: f64,
    pub guidance_start: f64,
    pub guidance_end: f64,
    pub guessmode: bool,
}

impl ConditioningUnit {
    pub fn new(input_image: ImageHandle) -> Self {
        Self {
            input_image,
            mask: None,
            module: None,
            model: None,
            weight: None,
            resize_mode: None,
            lowvram: None,
            processor_res: None,
            threshold_a: None,
            threshold_b: None,
            guidance: None,
            guidance_start: None,
            guidance_end: None,
            guessmode: None,
        }
    }

    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_mask(mut self, mask: ImageHandle) -> Self {
        self.mask = Some(mask);
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn with_guidance_range(mut self, start: f64, end: f64) -> Self {
        self.guidance_start = Some(start);
        self.guidance_end = Some(end);
        self
    }

    fn resolved_guidance_range(&self) -> (f64, f64) {
        (
            self.guidance_start.unwrap_or(0.0),
            self.guidance_end.unwrap_or(1.0),
        )
    }

    /// 校验引导区间: 0 <= start <= end <= 1
    pub fn validate(&self) -> Result<(), GenerationError> {
        let (start, end) = self.resolved_guidance_range();
        if !(0.0..=1.0).contains(&start) || !(0.0..=1.0).contains(&end) {
            return Err(GenerationError::Validation(format!(
                "guidance range must lie within [0, 1], got [{}, {}]",
                start, end
            )));
        }
        if start > end {
            return Err(GenerationError::Validation(format!(
                "guidance_start ({}) must not exceed guidance_end ({})",
                start, end
            )));
        }
        Ok(())
    }

    /// 编码单元自身的图像（及蒙版）并填充默认值
    pub async fn encode(&self) -> Result<ControlNetUnitPayload, GenerationError> {
        self.validate()?;

        let (input_image, mask) = tokio::try_join!(
            ImageCodec::encode(&self.input_image),
            ImageCodec::encode_optional(self.mask.as_ref()),
        )?;
        let (guidance_start, guidance_end) = self.resolved_guidance_range();

        Ok(ControlNetUnitPayload {
            input_image,
            mask,
            module: self.module.clone().unwrap_or_else(|| "none".to_string()),
            model: self.model.clone().unwrap_or_else(|| "None".to_string()),
            weight: self.weight.unwrap_or(1.0),
            resize_mode: self
                .resize_mode
                .clone()
                .unwrap_or_else(|| "Scale to Fit (Inner Fit)".to_string()),
            lowvram: self.lowvram.unwrap_or(false),
            processor_res: self.processor_res.unwrap_or(64),
            threshold_a: self.threshold_a.unwrap_or(64.0),
            threshold_b: self.threshold_b.unwrap_or(64.0),
            guidance: self.guidance.unwrap_or(1.0),
            guidance_start,
            guidance_end,
            guessmode: self.guessmode.unwrap_or(false),
        })
    }
}

/// 并发编码多个单元，结果顺序与输入顺序一致
pub async fn encode_units(
    units: &[ConditioningUnit],
) -> Result<Vec<ControlNetUnitPayload>, GenerationError> {
    try_join_all(units.iter().map(ConditioningUnit::encode)).await
}

/// ControlNet 预处理检测请求
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ControlNetDetectOptions {
    #[serde(default)]
    pub controlnet_input_images: Vec<ImageHandle>,
    pub controlnet_module: Option<String>,
    pub controlnet_processor_res: Option<u32>,
    pub controlnet_threshold_a: Option<f64>,
    pub controlnet_threshold_b: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControlNetDetectPayload {
    pub controlnet_module: String,
    pub controlnet_input_images: Vec<String>,
    pub controlnet_processor_res: u32,
    pub controlnet_threshold_a: f64,
    pub controlnet_threshold_b: f64,
}

impl ControlNetDetectOptions {
    pub async fn into_payload(&self) -> Result<ControlNetDetectPayload, GenerationError> {
        let controlnet_input_images = ImageCodec::encode_all(&self.controlnet_input_images).await?;
        Ok(ControlNetDetectPayload {
            controlnet_module: self
                .controlnet_module
                .clone()
                .unwrap_or_else(|| "none".to_string()),
            controlnet_input_images,
            controlnet_processor_res: self.controlnet_processor_res.unwrap_or(512),
            controlnet_threshold_a: self.controlnet_threshold_a.unwrap_or(64.0),
            controlnet_threshold_b: self.controlnet_threshold_b.unwrap_or(64.0),
        })
    }
}
