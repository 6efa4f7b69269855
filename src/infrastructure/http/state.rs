//! Application State
//!
//! worker 与 origin 两个角色各自的路由状态

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::application::{
    GetTaskHandler, ListTasksHandler, SubmitTaskHandler, TaskStorePort,
};
use crate::infrastructure::relay::WorkerService;

/// worker 侧状态
pub struct WorkerState {
    pub service: Arc<WorkerService>,
    /// 进程关闭时取消正在等待的中继任务
    pub shutdown: CancellationToken,
}

impl WorkerState {
    pub fn new(service: Arc<WorkerService>, shutdown: CancellationToken) -> Self {
        Self { service, shutdown }
    }
}

/// origin 侧状态
pub struct OriginState {
    pub task_store: Arc<dyn TaskStorePort>,

    // ========== Command Handlers ==========
    pub submit_task_handler: SubmitTaskHandler,

    // ========== Query Handlers ==========
    pub get_task_handler: GetTaskHandler,
    pub list_tasks_handler: ListTasksHandler,
}

impl OriginState {
    pub fn new(task_store: Arc<dyn TaskStorePort>) -> Self {
        Self {
            task_store: task_store.clone(),
            submit_task_handler: SubmitTaskHandler::new(task_store.clone()),
            get_task_handler: GetTaskHandler::new(task_store.clone()),
            list_tasks_handler: ListTasksHandler::new(task_store),
        }
    }
}
