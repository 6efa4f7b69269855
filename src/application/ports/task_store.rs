//! Task Store Port - 任务存储与租约
//!
//! 具体实现在 infrastructure/persistence/sqlite 与 infrastructure/memory

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::task::{RequesterId, Task, TaskError, TaskId, TaskSummary};

/// 任务存储错误
#[derive(Debug, Error)]
pub enum TaskStoreError {
    #[error("Task not found: {0}")]
    NotFound(String),

    #[error("Lease lost for task {task_id} (owner {owner})")]
    LeaseLost { task_id: String, owner: String },

    #[error("Invalid task state: {0}")]
    InvalidState(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<TaskError> for TaskStoreError {
    fn from(err: TaskError) -> Self {
        match err {
            TaskError::LeaseLost { task_id, owner } => Self::LeaseLost { task_id, owner },
            other => Self::InvalidState(other.to_string()),
        }
    }
}

/// Task Store Port
///
/// `claim_next` 必须是原子的: 同一任务在租约有效期内只会被一个实例占有
#[async_trait]
pub trait TaskStorePort: Send + Sync {
    /// 新任务入队
    async fn enqueue(&self, task: &Task) -> Result<(), TaskStoreError>;

    /// 占有下一个可派发任务（Pending，或租约已过期的 Dispatched），按创建时间先后
    async fn claim_next(&self, owner: &str, lease: Duration) -> Result<Option<Task>, TaskStoreError>;

    /// 标记完成，仅限当前租约持有者
    async fn complete(&self, id: &TaskId, owner: &str, result_ref: &str) -> Result<(), TaskStoreError>;

    /// 标记失败，仅限当前租约持有者
    async fn fail(&self, id: &TaskId, owner: &str, error: &str) -> Result<(), TaskStoreError>;

    /// 完整任务（含生成请求）
    async fn find_by_id(&self, id: &TaskId) -> Result<Option<Task>, TaskStoreError>;

    /// 任务概要，不读取生成请求
    async fn find_summary(&self, id: &TaskId) -> Result<Option<TaskSummary>, TaskStoreError>;

    /// 请求者的全部任务概要，最新的在前
    async fn list_by_requester(
        &self,
        requester: &RequesterId,
    ) -> Result<Vec<TaskSummary>, TaskStoreError>;
}
