//! Backend Catalog - 后端选项与可枚举资源

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};

use crate::application::ports::{BackendError, BackendTransportPort};
use crate::domain::generation::{
    BackendModel, BackendOptions, FaceRestorer, Hypernetwork, ProgressState, PromptStyle,
    RealesrganModel, Sampler, Upscaler,
};

pub struct BackendCatalog {
    transport: Arc<dyn BackendTransportPort>,
}

fn parse<T: DeserializeOwned>(path: &str, value: Value) -> Result<T, BackendError> {
    serde_json::from_value(value)
        .map_err(|e| BackendError::InvalidResponse(format!("{}: {}", path, e)))
}

impl BackendCatalog {
    pub fn new(transport: Arc<dyn BackendTransportPort>) -> Self {
        Self { transport }
    }

    async fn get_as<T: DeserializeOwned>(&self, path: &str) -> Result<T, BackendError> {
        let value = self.transport.get(path).await?;
        parse(path, value)
    }

    pub async fn get_options(&self) -> Result<BackendOptions, BackendError> {
        self.get_as("/sdapi/v1/options").await
    }

    pub async fn set_options(&self, options: Map<String, Value>) -> Result<Value, BackendError> {
        self.transport
            .post("/sdapi/v1/options", &Value::Object(options))
            .await
    }

    /// 当前加载的 checkpoint
    pub async fn get_current_model(&self) -> Result<Option<String>, BackendError> {
        let options = self.get_options().await?;
        Ok(options.sd_model_checkpoint().map(str::to_string))
    }

    pub async fn get_progress(&self, skip_current_image: bool) -> Result<ProgressState, BackendError> {
        self.get_as(&format!(
            "/sdapi/v1/progress?skipCurrentImage={}",
            skip_current_image
        ))
        .await
    }

    pub async fn get_cmd_flags(&self) -> Result<Map<String, Value>, BackendError> {
        self.get_as("/sdapi/v1/cmd-flags").await
    }

    pub async fn get_samplers(&self) -> Result<Vec<Sampler>, BackendError> {
        self.get_as("/sdapi/v1/samplers").await
    }

    pub async fn get_upscalers(&self) -> Result<Vec<Upscaler>, BackendError> {
        self.get_as("/sdapi/v1/upscalers").await
    }

    pub async fn get_sd_models(&self) -> Result<Vec<BackendModel>, BackendError> {
        self.get_as("/sdapi/v1/sd-models").await
    }

    pub async fn get_hypernetworks(&self) -> Result<Vec<Hypernetwork>, BackendError> {
        self.get_as("/sdapi/v1/hypernetworks").await
    }

    pub async fn get_face_restorers(&self) -> Result<Vec<FaceRestorer>, BackendError> {
        self.get_as("/sdapi/v1/face-restorers").await
    }

    pub async fn get_realesrgan_models(&self) -> Result<Vec<RealesrganModel>, BackendError> {
        self.get_as("/sdapi/v1/realesrgan-models").await
    }

    pub async fn get_prompt_styles(&self) -> Result<Vec<PromptStyle>, BackendError> {
        self.get_as("/sdapi/v1/prompt-styles").await
    }

    pub async fn refresh_checkpoints(&self) -> Result<(), BackendError> {
        self.transport
            .post("/sdapi/v1/refresh-checkpoints", &json!({}))
            .await?;
        Ok(())
    }

    /// 可用的 ControlNet 模型
    pub async fn controlnet_models(&self) -> Result<Vec<String>, BackendError> {
        self.list_field("/controlnet/model_list", "model_list").await
    }

    /// 可用的 ControlNet 预处理模块
    pub async fn controlnet_modules(&self) -> Result<Vec<String>, BackendError> {
        self.list_field("/controlnet/module_list", "module_list").await
    }

    async fn list_field(&self, path: &str, field: &str) -> Result<Vec<String>, BackendError> {
        let mut value = self.transport.get(path).await?;
        let list = value
            .get_mut(field)
            .map(Value::take)
            .ok_or_else(|| BackendError::InvalidResponse(format!("{}: missing {}", path, field)))?;
        parse(path, list)
    }
}
