//! Task Handlers - origin 侧任务接口

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::application::{GetTask, ListTasks, SubmitTask};
use crate::domain::task::TaskId;
use crate::infrastructure::http::dto::{
    ApiResponse, GetTaskRequest, ListTasksRequest, SubmitTaskRequest, TaskDto, TaskListDto,
};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::OriginState;

pub async fn submit_task(
    State(state): State<Arc<OriginState>>,
    Json(req): Json<SubmitTaskRequest>,
) -> Result<Json<ApiResponse<TaskDto>>, ApiError> {
    let cmd = SubmitTask {
        requester: req.requester,
        request: req.request,
        reward: req.reward,
    };

    let task = state.submit_task_handler.handle(cmd).await?;

    Ok(Json(ApiResponse::success(task.into())))
}

pub async fn get_task(
    State(state): State<Arc<OriginState>>,
    Json(req): Json<GetTaskRequest>,
) -> Result<Json<ApiResponse<TaskDto>>, ApiError> {
    let task_id = TaskId::parse(&req.task_id)
        .ok_or_else(|| ApiError::BadRequest(format!("Invalid task id: {}", req.task_id)))?;

    let task = state.get_task_handler.handle(GetTask { task_id }).await?;

    Ok(Json(ApiResponse::success(task.into())))
}

pub async fn list_tasks(
    State(state): State<Arc<OriginState>>,
    Json(req): Json<ListTasksRequest>,
) -> Result<Json<ApiResponse<TaskListDto>>, ApiError> {
    let tasks = state
        .list_tasks_handler
        .handle(ListTasks {
            requester: req.requester,
        })
        .await?;

    let tasks: Vec<TaskDto> = tasks.into_iter().map(TaskDto::from).collect();
    Ok(Json(ApiResponse::success(TaskListDto {
        total: tasks.len(),
        tasks,
    })))
}
