//! Task Queries

use crate::domain::task::TaskId;

/// 获取任务详情查询
#[derive(Debug, Clone)]
pub struct GetTask {
    pub task_id: TaskId,
}

/// 列出请求者的全部任务
#[derive(Debug, Clone)]
pub struct ListTasks {
    pub requester: String,
}
