//! Model Resolver - 模型名称解析与切换
//!
//! 精确匹配优先；否则（允许模糊时）取 Dice 相似度最高且严格大于 0.5 的候选。

use std::sync::Arc;

use serde_json::{Map, Value};

use super::BackendCatalog;
use crate::application::error::ApplicationError;
use crate::domain::generation::BackendOptions;
use crate::domain::model_match::find_best_match;

pub struct ModelResolver {
    catalog: Arc<BackendCatalog>,
}

impl ModelResolver {
    pub fn new(catalog: Arc<BackendCatalog>) -> Self {
        Self { catalog }
    }

    /// 把请求的名称解析为后端模型名
    pub async fn resolve(&self, requested: &str, allow_fuzzy: bool) -> Result<String, ApplicationError> {
        let models = self.catalog.get_sd_models().await?;
        let names: Vec<&str> = models.iter().map(|m| m.model_name.as_str()).collect();

        if names.contains(&requested) {
            return Ok(requested.to_string());
        }

        if allow_fuzzy {
            if let Some(best) = find_best_match(requested, &names) {
                if let Some(target) = best.accepted() {
                    tracing::info!(
                        requested,
                        resolved = target,
                        rating = best.best().rating,
                        "Model resolved by fuzzy match"
                    );
                    return Ok(target.to_string());
                }
                tracing::debug!(
                    requested,
                    closest = %best.best().target,
                    rating = best.best().rating,
                    "Closest model below threshold"
                );
            }
        }

        Err(ApplicationError::model_not_found(requested))
    }

    /// 解析并切换后端当前模型，返回实际使用的模型名
    pub async fn set_model(&self, requested: &str, find_closest: bool) -> Result<String, ApplicationError> {
        let resolved = self.resolve(requested, find_closest).await?;

        let mut options = Map::new();
        options.insert(
            BackendOptions::MODEL_CHECKPOINT.to_string(),
            Value::String(resolved.clone()),
        );
        self.catalog.set_options(options).await?;

        tracing::info!(model = %resolved, "Backend model set");
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::adapters::FakeBackend;
    use serde_json::json;

    fn backend_with_models(names: &[&str]) -> Arc<FakeBackend> {
        let models: Vec<Value> = names
            .iter()
            .map(|name| json!({ "title": format!("{}.safetensors", name), "model_name": name }))
            .collect();
        let backend = Arc::new(FakeBackend::new());
        backend
            .on_get("/sdapi/v1/sd-models", Ok(Value::Array(models)))
            .on_post("/sdapi/v1/options", Ok(Value::Null));
        backend
    }

    fn resolver(backend: Arc<FakeBackend>) -> ModelResolver {
        ModelResolver::new(Arc::new(BackendCatalog::new(backend)))
    }

    #[tokio::test]
    async fn test_exact_match_wins() {
        let backend = backend_with_models(&["anything-v3", "anything-v3-fp16"]);
        let resolved = resolver(backend).resolve("anything-v3", true).await.unwrap();
        assert_eq!(resolved, "anything-v3");
    }

    #[tokio::test]
    async fn test_fuzzy_above_threshold() {
        let backend = backend_with_models(&["sd-1-5-pruned", "anything-v3"]);
        let resolved = resolver(backend).resolve("anything v3", true).await.unwrap();
        assert_eq!(resolved, "anything-v3");
    }

    #[tokio::test]
    async fn test_fuzzy_disabled_requires_exact() {
        let backend = backend_with_models(&["anything-v3"]);
        let result = resolver(backend).resolve("anything v3", false).await;
        assert!(matches!(result, Err(ApplicationError::ModelNotFound(_))));
    }

    #[tokio::test]
    async fn test_fuzzy_not_above_threshold_fails() {
        let backend = backend_with_models(&["sd-1-5-pruned", "anything-v3"]);
        let result = resolver(backend.clone()).resolve("SD 1.5", true).await;
        assert!(matches!(result, Err(ApplicationError::ModelNotFound(_))));

        // 恰好 0.5 也不接受
        let backend = backend_with_models(&["abd"]);
        let result = resolver(backend).resolve("abc", true).await;
        assert!(matches!(result, Err(ApplicationError::ModelNotFound(_))));
    }

    #[tokio::test]
    async fn test_set_model_posts_checkpoint_option() {
        let backend = backend_with_models(&["sd-1-5-pruned", "anything-v3"]);
        let resolved = resolver(backend.clone())
            .set_model("anything v3", true)
            .await
            .unwrap();
        assert_eq!(resolved, "anything-v3");

        let posted: Vec<_> = backend
            .calls()
            .into_iter()
            .filter(|call| call.method == "POST")
            .collect();
        assert_eq!(posted.len(), 1);
        assert_eq!(
            posted[0].body,
            Some(json!({ "sd_model_checkpoint": "anything-v3" }))
        );
    }

    #[tokio::test]
    async fn test_set_model_failure_does_not_touch_options() {
        let backend = backend_with_models(&["anything-v3"]);
        let result = resolver(backend.clone()).set_model("SD 1.5", true).await;
        assert!(matches!(result, Err(ApplicationError::ModelNotFound(_))));
        assert_eq!(backend.call_count("POST", "/sdapi/v1/options"), 0);
    }
}
