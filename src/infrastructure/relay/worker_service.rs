//! Worker Service - worker 侧的单任务执行
//!
//! 后端一次只跑一个中继任务: 信号量只有一个许可，
//! 拿到许可后（可选）等待后端空闲，再提交生成请求。

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::application::error::ApplicationError;
use crate::application::ports::RelayJob;
use crate::application::services::{BackendCatalog, GenerationClient, ReadinessPoller};
use crate::domain::generation::{GenerationResult, ProgressState};

pub struct WorkerService {
    client: Arc<GenerationClient>,
    catalog: Arc<BackendCatalog>,
    poller: Option<Arc<ReadinessPoller>>,
    gate: Semaphore,
}

impl WorkerService {
    pub fn new(
        client: Arc<GenerationClient>,
        catalog: Arc<BackendCatalog>,
        poller: Option<Arc<ReadinessPoller>>,
    ) -> Self {
        Self {
            client,
            catalog,
            poller,
            gate: Semaphore::new(1),
        }
    }

    /// 执行一个中继任务，调用方可以通过 `cancel` 放弃等待
    pub async fn generate(
        &self,
        job: RelayJob,
        cancel: &CancellationToken,
    ) -> Result<GenerationResult, ApplicationError> {
        let _permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ApplicationError::Cancelled),
            permit = self.gate.acquire() => permit
                .map_err(|e| ApplicationError::internal(format!("worker gate closed: {}", e)))?,
        };

        tracing::info!(
            task_id = %job.task_id,
            kind = job.request.kind(),
            "Relay job accepted"
        );

        if let Some(poller) = &self.poller {
            poller.wait_for_ready(cancel).await?;
        }

        let result = self.client.submit(&job.request).await;
        match &result {
            Ok(r) => tracing::info!(task_id = %job.task_id, images = r.images.len(), "Relay job finished"),
            Err(e) => tracing::warn!(task_id = %job.task_id, error = %e, "Relay job failed"),
        }
        result
    }

    /// 透传后端进度快照
    pub async fn progress(&self) -> Result<ProgressState, ApplicationError> {
        Ok(self.catalog.get_progress(true).await?)
    }

    /// 当前是否有任务在执行
    pub fn is_busy(&self) -> bool {
        self.gate.available_permits() == 0
    }
}
