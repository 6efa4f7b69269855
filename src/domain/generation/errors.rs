//! Generation Context - Errors

use thiserror::Error;

use crate::domain::image::CodecError;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("请求参数无效: {0}")]
    Validation(String),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("请求序列化失败: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for GenerationError {
    fn from(err: serde_json::Error) -> Self {
        GenerationError::Serialization(err.to_string())
    }
}
