//! 应用层错误定义
//!
//! 统一的生成/中继用例错误类型

use thiserror::Error;

use crate::application::ports::{
    BackendError, ImageStoreError, RelayError, RewardError, TaskStoreError,
};
use crate::domain::generation::GenerationError;
use crate::domain::image::CodecError;
use crate::domain::task::TaskError;

/// 应用层错误
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// 请求参数无效，不会触达网络
    #[error("Validation error: {0}")]
    Validation(String),

    /// 图像编解码失败
    #[error("Decode error: {0}")]
    Decode(#[from] CodecError),

    /// 后端调用失败，原样传递
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    /// 模型无法解析
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// 中继派发失败
    #[error("Relay dispatch error: {0}")]
    RelayDispatch(#[from] RelayError),

    /// 资源未找到
    #[error("{resource_type} not found: {id}")]
    NotFound {
        resource_type: &'static str,
        id: String,
    },

    /// 存储错误
    #[error("Storage error: {0}")]
    Storage(String),

    /// 奖励发放失败
    #[error("Reward error: {0}")]
    Reward(#[from] RewardError),

    /// 调用方主动取消
    #[error("Cancelled")]
    Cancelled,

    /// 内部错误
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApplicationError {
    /// 创建 NotFound 错误
    pub fn not_found(resource_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type,
            id: id.into(),
        }
    }

    /// 创建验证错误
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// 创建模型未找到错误
    pub fn model_not_found(name: impl Into<String>) -> Self {
        Self::ModelNotFound(name.into())
    }

    /// 创建内部错误
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// 错误类别，用于日志与事件
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Decode(_) => "decode",
            Self::Backend(_) => "backend",
            Self::ModelNotFound(_) => "model_not_found",
            Self::RelayDispatch(_) => "relay_dispatch",
            Self::NotFound { .. } => "not_found",
            Self::Storage(_) => "storage",
            Self::Reward(_) => "reward",
            Self::Cancelled => "cancelled",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<GenerationError> for ApplicationError {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::Validation(message) => Self::Validation(message),
            GenerationError::Codec(codec) => Self::Decode(codec),
            GenerationError::Serialization(message) => Self::Internal(message),
        }
    }
}

impl From<TaskStoreError> for ApplicationError {
    fn from(err: TaskStoreError) -> Self {
        match err {
            TaskStoreError::NotFound(id) => Self::not_found("Task", id),
            other => Self::Storage(other.to_string()),
        }
    }
}

impl From<ImageStoreError> for ApplicationError {
    fn from(err: ImageStoreError) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<TaskError> for ApplicationError {
    fn from(err: TaskError) -> Self {
        Self::Validation(err.to_string())
    }
}
