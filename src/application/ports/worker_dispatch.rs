//! Worker Dispatch Port - origin 侧向 worker 侧派发生成任务

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::generation::{GenerationRequest, GenerationResult};

/// 中继错误
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Worker unreachable: {0}")]
    Unreachable(String),

    #[error("Worker timeout")]
    Timeout,

    #[error("Worker rejected job: {0}")]
    Rejected(String),

    #[error("Invalid worker response: {0}")]
    InvalidResponse(String),

    #[error("Cannot encode job: {0}")]
    Encode(String),
}

/// 中继任务（线上格式）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayJob {
    pub task_id: String,
    pub request: GenerationRequest,
}

/// Worker Dispatch Port
#[async_trait]
pub trait WorkerDispatchPort: Send + Sync {
    /// 派发并等待完整结果
    async fn dispatch(&self, job: &RelayJob) -> Result<GenerationResult, RelayError>;
}
