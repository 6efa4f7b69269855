//! HTTP Worker Client - origin 侧调用 worker 侧
//!
//! POST {worker_url}/api/relay/generate
//! Request: {"task_id": "...", "request": {"kind": "...", "options": {...}}}
//! Response: {"errno": 0, "error": "", "data": {"images": [...], "info": ..., "parameters": ...}}

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use crate::application::ports::{RelayError, RelayJob, WorkerDispatchPort};
use crate::domain::generation::GenerationResult;
use crate::domain::image::ImageCodec;

/// worker 回复中的结果
#[derive(Debug, Deserialize)]
struct WorkerResult {
    #[serde(default)]
    images: Vec<String>,
    #[serde(default)]
    info: Value,
    #[serde(default)]
    parameters: Value,
}

/// worker 回复信封
#[derive(Debug, Deserialize)]
struct WorkerReply {
    errno: i32,
    #[serde(default)]
    error: String,
    data: Option<WorkerResult>,
}

/// HTTP worker 客户端配置
#[derive(Debug, Clone)]
pub struct HttpWorkerClientConfig {
    /// worker 基础 URL
    pub base_url: String,
    /// 单个任务的超时时间（秒），包含 worker 等待后端空闲的时间
    pub timeout_secs: u64,
}

impl Default for HttpWorkerClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5070".to_string(),
            timeout_secs: 600,
        }
    }
}

/// HTTP worker 客户端
pub struct HttpWorkerClient {
    client: Client,
    config: HttpWorkerClientConfig,
}

impl HttpWorkerClient {
    pub fn new(config: HttpWorkerClientConfig) -> Result<Self, RelayError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RelayError::Unreachable(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn generate_url(&self) -> String {
        format!("{}/api/relay/generate", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl WorkerDispatchPort for HttpWorkerClient {
    async fn dispatch(&self, job: &RelayJob) -> Result<GenerationResult, RelayError> {
        tracing::debug!(
            url = %self.generate_url(),
            task_id = %job.task_id,
            kind = job.request.kind(),
            "Dispatching job to worker"
        );

        // 请求体里只能出现传输字符串
        let job = RelayJob {
            task_id: job.task_id.clone(),
            request: job
                .request
                .clone()
                .into_transport()
                .await
                .map_err(|e| RelayError::Encode(e.to_string()))?,
        };

        let response = self
            .client
            .post(self.generate_url())
            .json(&job)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RelayError::Timeout
                } else if e.is_connect() {
                    RelayError::Unreachable(format!("Cannot connect to worker: {}", e))
                } else {
                    RelayError::Unreachable(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(RelayError::Rejected(format!("HTTP {}: {}", status, error_text)));
        }

        let reply: WorkerReply = response
            .json()
            .await
            .map_err(|e| RelayError::InvalidResponse(e.to_string()))?;

        if reply.errno != 0 {
            return Err(RelayError::Rejected(format!(
                "errno {}: {}",
                reply.errno, reply.error
            )));
        }

        let data = reply
            .data
            .ok_or_else(|| RelayError::InvalidResponse("missing data".to_string()))?;
        let images = ImageCodec::decode_all(data.images)
            .await
            .map_err(|e| RelayError::InvalidResponse(e.to_string()))?;

        tracing::info!(
            task_id = %job.task_id,
            images = images.len(),
            "Worker returned result"
        );

        Ok(GenerationResult {
            images,
            info: data.info,
            parameters: data.parameters,
            raw: Value::Null,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reply_envelope_parsing() {
        let reply: WorkerReply = serde_json::from_value(json!({
            "errno": 500,
            "error": "Backend error: Request timeout",
            "data": null
        }))
        .unwrap();
        assert_eq!(reply.errno, 500);
        assert!(reply.data.is_none());

        let reply: WorkerReply = serde_json::from_value(json!({
            "errno": 0,
            "error": "",
            "data": { "images": [], "info": "x" }
        }))
        .unwrap();
        let data = reply.data.unwrap();
        assert!(data.images.is_empty());
        assert!(data.parameters.is_null());
    }

    #[test]
    fn test_generate_url() {
        let client = HttpWorkerClient::new(HttpWorkerClientConfig {
            base_url: "http://worker:5070/".to_string(),
            timeout_secs: 5,
        })
        .unwrap();
        assert_eq!(client.generate_url(), "http://worker:5070/api/relay/generate");
    }
}
