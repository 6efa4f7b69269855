//! Task Command Handlers

use std::sync::Arc;

use crate::application::commands::SubmitTask;
use crate::application::error::ApplicationError;
use crate::application::ports::TaskStorePort;
use crate::application::queries::handlers::TaskResponse;
use crate::domain::task::{RequesterId, Task};

// ============================================================================
// SubmitTask
// ============================================================================

/// SubmitTask Handler
///
/// 入队前完成同步校验，非法请求不会进入队列
pub struct SubmitTaskHandler {
    task_store: Arc<dyn TaskStorePort>,
}

impl SubmitTaskHandler {
    pub fn new(task_store: Arc<dyn TaskStorePort>) -> Self {
        Self { task_store }
    }

    pub async fn handle(&self, command: SubmitTask) -> Result<TaskResponse, ApplicationError> {
        let requester = RequesterId::new(command.requester)?;
        command.request.validate()?;
        if !command.request.produces_images() {
            return Err(ApplicationError::validation(format!(
                "{} requests cannot be relayed, they produce no images",
                command.request.kind()
            )));
        }

        // 入队的请求只保存传输字符串
        let request = command.request.into_transport().await?;
        let task = Task::new(requester, request, command.reward);
        self.task_store.enqueue(&task).await?;

        tracing::info!(
            task_id = %task.id(),
            requester = %task.requester(),
            kind = task.request().kind(),
            "Task submitted"
        );

        Ok(TaskResponse::from(task.summary()))
    }
}
