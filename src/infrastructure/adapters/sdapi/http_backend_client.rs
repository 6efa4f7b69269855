//! HTTP Backend Client - 调用 Stable Diffusion WebUI HTTP API
//!
//! 实现 BackendTransportPort，所有请求共享同一个连接池，
//! 配置了用户名和密码时每个请求都带 basic auth。

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use std::time::Duration;

use crate::application::ports::{BackendError, BackendTransportPort};

/// HTTP 后端客户端配置
#[derive(Debug, Clone)]
pub struct HttpBackendClientConfig {
    /// 后端基础 URL
    pub base_url: String,
    /// 请求超时时间（秒）
    pub timeout_secs: u64,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for HttpBackendClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:7860".to_string(),
            timeout_secs: 30,
            username: None,
            password: None,
        }
    }
}

impl HttpBackendClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }
}

/// HTTP 后端客户端
pub struct HttpBackendClient {
    client: Client,
    config: HttpBackendClientConfig,
}

impl HttpBackendClient {
    /// 创建新的后端客户端
    pub fn new(config: HttpBackendClientConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BackendError::Network(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.config.username {
            Some(username) => builder.basic_auth(username, self.config.password.as_deref()),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder, path: &str) -> Result<Value, BackendError> {
        let response = self
            .authorize(builder)
            .send()
            .await
            .map_err(map_send_error)?;

        read_json(response, path).await
    }
}

fn map_send_error(e: reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::Timeout
    } else if e.is_connect() {
        BackendError::Network(format!("Cannot connect to backend: {}", e))
    } else {
        BackendError::Network(e.to_string())
    }
}

async fn read_json(response: Response, path: &str) -> Result<Value, BackendError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(path, status = status.as_u16(), "Backend returned error status");
        return Err(BackendError::Status {
            status: status.as_u16(),
            body,
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| BackendError::InvalidResponse(format!("Failed to read body: {}", e)))?;

    // refresh-checkpoints 等接口回复空 body
    if bytes.is_empty() {
        return Ok(Value::Null);
    }

    serde_json::from_slice(&bytes)
        .map_err(|e| BackendError::InvalidResponse(format!("{} returned invalid JSON: {}", path, e)))
}

#[async_trait]
impl BackendTransportPort for HttpBackendClient {
    async fn get(&self, path: &str) -> Result<Value, BackendError> {
        tracing::debug!(url = %self.url(path), "Backend GET");
        self.send(self.client.get(self.url(path)), path).await
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, BackendError> {
        tracing::debug!(url = %self.url(path), "Backend POST");
        self.send(self.client.post(self.url(path)).json(body), path)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = HttpBackendClientConfig::default();
        assert_eq!(config.base_url, "http://127.0.0.1:7860");
        assert_eq!(config.timeout_secs, 30);
        assert!(config.username.is_none());
    }

    #[test]
    fn test_config_builder() {
        let config = HttpBackendClientConfig::new("http://gpu-box:7861/")
            .with_timeout(120)
            .with_auth("user", "secret");
        assert_eq!(config.timeout_secs, 120);
        assert_eq!(config.username.as_deref(), Some("user"));

        let client = HttpBackendClient::new(config).unwrap();
        assert_eq!(client.url("/sdapi/v1/txt2img"), "http://gpu-box:7861/sdapi/v1/txt2img");
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_network_error() {
        // 端口 9 (discard) 在测试环境中通常无人监听
        let client = HttpBackendClient::new(
            HttpBackendClientConfig::new("http://127.0.0.1:9").with_timeout(2),
        )
        .unwrap();
        let err = client.get("/sdapi/v1/options").await.unwrap_err();
        assert!(matches!(err, BackendError::Network(_) | BackendError::Timeout));
    }
}
