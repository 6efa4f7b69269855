//! Backend Transport Port - 生成后端 HTTP 传输抽象
//!
//! 具体实现在 infrastructure/adapters/sdapi，测试中可替换为脚本化的假实现

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// 后端调用错误
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Backend returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Backend Transport Port
///
/// 路径相对于后端根地址（例如 `/sdapi/v1/txt2img`），认证由实现统一附加
#[async_trait]
pub trait BackendTransportPort: Send + Sync {
    async fn get(&self, path: &str) -> Result<Value, BackendError>;

    async fn post(&self, path: &str, body: &Value) -> Result<Value, BackendError>;
}
