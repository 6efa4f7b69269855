//! Task Context - Errors

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum TaskError {
    #[error("请求者标识无效: {0}")]
    InvalidRequester(String),

    #[error("任务 {task_id} 不能从 {from} 执行 {action}")]
    InvalidTransition {
        task_id: String,
        from: &'static str,
        action: &'static str,
    },

    #[error("任务 {task_id} 的租约已不属于 {owner}")]
    LeaseLost { task_id: String, owner: String },
}
