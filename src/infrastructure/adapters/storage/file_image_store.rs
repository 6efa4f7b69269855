//! File Image Store - 文件系统图像存储实现
//!
//! 实现 ImageStorePort，每个任务一个目录: `{base_dir}/{task_id}/image_{n}.png`

use async_trait::async_trait;
use futures_util::future::try_join_all;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::application::ports::{ImageStoreError, ImageStorePort};
use crate::domain::image::{CodecError, ImageHandle};

/// 文件系统图像存储
pub struct FileImageStore {
    /// 存储根目录
    base_dir: PathBuf,
}

impl FileImageStore {
    /// 创建新的文件存储
    pub async fn new(base_dir: impl AsRef<Path>) -> Result<Self, ImageStoreError> {
        let base_dir = base_dir.as_ref().to_path_buf();

        // 确保目录存在
        fs::create_dir_all(&base_dir).await?;

        Ok(Self { base_dir })
    }

    /// 获取存储根目录
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// 结果引用对应的绝对路径
    pub fn resolve(&self, result_ref: &str) -> PathBuf {
        self.base_dir.join(result_ref)
    }

    fn relative_path(task_id: &str, index: usize) -> String {
        format!("{}/image_{}.png", task_id, index)
    }
}

async fn png_bytes(image: ImageHandle) -> Result<Vec<u8>, CodecError> {
    tokio::task::spawn_blocking(move || image.to_png_bytes())
        .await
        .map_err(|e| CodecError::TaskAborted(e.to_string()))?
}

#[async_trait]
impl ImageStorePort for FileImageStore {
    async fn save(&self, task_id: &str, images: &[ImageHandle]) -> Result<String, ImageStoreError> {
        if images.is_empty() {
            return Err(ImageStoreError::Empty(format!(
                "task {} produced no images",
                task_id
            )));
        }

        fs::create_dir_all(self.base_dir.join(task_id)).await?;

        let encoded = try_join_all(images.iter().cloned().map(png_bytes)).await?;

        let mut total_bytes = 0usize;
        for (index, bytes) in encoded.iter().enumerate() {
            fs::write(self.resolve(&Self::relative_path(task_id, index)), bytes).await?;
            total_bytes += bytes.len();
        }

        tracing::debug!(
            task_id,
            count = images.len(),
            total_bytes,
            "Saved task images"
        );

        Ok(Self::relative_path(task_id, 0))
    }
}
