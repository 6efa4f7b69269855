//! Task Query Handlers

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::application::error::ApplicationError;
use crate::application::ports::TaskStorePort;
use crate::application::queries::{GetTask, ListTasks};
use crate::domain::task::{RequesterId, RewardSpec, TaskId, TaskStatus, TaskSummary};

// ============================================================================
// Response DTOs
// ============================================================================

/// 任务详情响应
#[derive(Debug, Clone)]
pub struct TaskResponse {
    pub task_id: TaskId,
    pub requester: String,
    pub kind: String,
    pub status: TaskStatus,
    pub result_ref: Option<String>,
    pub error: Option<String>,
    pub reward: Option<RewardSpec>,
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<TaskSummary> for TaskResponse {
    fn from(task: TaskSummary) -> Self {
        Self {
            task_id: task.id,
            requester: task.requester.to_string(),
            kind: task.kind,
            status: task.status,
            result_ref: task.result_ref,
            error: task.error,
            reward: task.reward,
            attempts: task.attempts,
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GetTask Handler
pub struct GetTaskHandler {
    task_store: Arc<dyn TaskStorePort>,
}

impl GetTaskHandler {
    pub fn new(task_store: Arc<dyn TaskStorePort>) -> Self {
        Self { task_store }
    }

    pub async fn handle(&self, query: GetTask) -> Result<TaskResponse, ApplicationError> {
        let task = self
            .task_store
            .find_summary(&query.task_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("Task", query.task_id.to_string()))?;

        Ok(TaskResponse::from(task))
    }
}

/// ListTasks Handler
pub struct ListTasksHandler {
    task_store: Arc<dyn TaskStorePort>,
}

impl ListTasksHandler {
    pub fn new(task_store: Arc<dyn TaskStorePort>) -> Self {
        Self { task_store }
    }

    pub async fn handle(&self, query: ListTasks) -> Result<Vec<TaskResponse>, ApplicationError> {
        let requester = RequesterId::new(query.requester)?;
        let tasks = self.task_store.list_by_requester(&requester).await?;
        Ok(tasks.into_iter().map(TaskResponse::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::generation::{GenerationRequest, Txt2ImgOptions};
    use crate::domain::task::Task;
    use crate::infrastructure::memory::InMemoryTaskStore;

    fn task_for(requester: &str) -> Task {
        Task::new(
            RequesterId::new(requester).unwrap(),
            GenerationRequest::TextToImage(Txt2ImgOptions::default()),
            None,
        )
    }

    #[tokio::test]
    async fn test_get_missing_task_is_not_found() {
        let store = Arc::new(InMemoryTaskStore::new());
        let handler = GetTaskHandler::new(store);
        let result = handler
            .handle(GetTask {
                task_id: TaskId::new(),
            })
            .await;
        assert!(matches!(result, Err(ApplicationError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_list_only_returns_requester_tasks() {
        let store = Arc::new(InMemoryTaskStore::new());
        store.enqueue(&task_for("alice")).await.unwrap();
        store.enqueue(&task_for("alice")).await.unwrap();
        store.enqueue(&task_for("bob")).await.unwrap();

        let handler = ListTasksHandler::new(store);
        let tasks = handler
            .handle(ListTasks {
                requester: "alice".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(tasks.len(), 2);
        assert!(tasks.iter().all(|t| t.requester == "alice"));
    }
}
