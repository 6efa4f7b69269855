//! Backend Catalog - 后端可枚举资源

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 后端 checkpoint 模型，作为模型匹配的候选
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendModel {
    pub title: String,
    pub model_name: String,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub sha256: Option<String>,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub config: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sampler {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub options: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Upscaler {
    pub name: String,
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub model_path: Option<String>,
    #[serde(default)]
    pub model_url: Option<String>,
    #[serde(default)]
    pub scale: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hypernetwork {
    pub name: String,
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceRestorer {
    pub name: String,
    #[serde(default)]
    pub cmd_dir: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealesrganModel {
    pub name: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub scale: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptStyle {
    pub name: String,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub negative_prompt: Option<String>,
}

/// `/sdapi/v1/options`，字段很多且随版本变化，只对常用字段提供访问器
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackendOptions(pub Map<String, Value>);

impl BackendOptions {
    pub const MODEL_CHECKPOINT: &'static str = "sd_model_checkpoint";

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// 当前加载的模型
    pub fn sd_model_checkpoint(&self) -> Option<&str> {
        self.0.get(Self::MODEL_CHECKPOINT).and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_backend_model_tolerates_missing_metadata() {
        let model: BackendModel = serde_json::from_value(json!({
            "title": "anything-v3.safetensors [abc123]",
            "model_name": "anything-v3"
        }))
        .unwrap();
        assert_eq!(model.model_name, "anything-v3");
        assert!(model.hash.is_none());
    }

    #[test]
    fn test_options_checkpoint_accessor() {
        let options: BackendOptions =
            serde_json::from_value(json!({ "sd_model_checkpoint": "sd-1-5", "CLIP_stop_at_last_layers": 2 }))
                .unwrap();
        assert_eq!(options.sd_model_checkpoint(), Some("sd-1-5"));
        assert_eq!(options.get("CLIP_stop_at_last_layers"), Some(&json!(2)));
    }
}
