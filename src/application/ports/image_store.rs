//! Image Store Port - 生成结果的持久化

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::image::{CodecError, ImageHandle};

#[derive(Debug, Error)]
pub enum ImageStoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Encode error: {0}")]
    Encode(#[from] CodecError),

    #[error("Nothing to store: {0}")]
    Empty(String),
}

/// Image Store Port
#[async_trait]
pub trait ImageStorePort: Send + Sync {
    /// 保存任务的结果图像，返回结果引用（第一张图像的相对路径）
    async fn save(&self, task_id: &str, images: &[ImageHandle]) -> Result<String, ImageStoreError>;
}
