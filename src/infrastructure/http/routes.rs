//! HTTP Routes
//!
//! Worker (`--relaySide ai`):
//! - /api/ping              GET   健康检查
//! - /api/relay/generate    POST  执行一个中继任务，返回完整结果
//! - /api/relay/progress    GET   后端进度快照
//!
//! Origin (`--relaySide frontend`):
//! - /api/ping              GET   健康检查
//! - /api/task/submit       POST  提交生成任务
//! - /api/task/get          POST  获取任务详情
//! - /api/task/list         POST  列出请求者的全部任务

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::state::{OriginState, WorkerState};

/// worker 侧路由
pub fn worker_routes() -> Router<Arc<WorkerState>> {
    Router::new().nest(
        "/api",
        Router::new()
            .route("/ping", get(handlers::ping))
            .nest("/relay", relay_routes()),
    )
}

/// origin 侧路由
pub fn origin_routes() -> Router<Arc<OriginState>> {
    Router::new().nest(
        "/api",
        Router::new()
            .route("/ping", get(handlers::ping))
            .nest("/task", task_routes()),
    )
}

/// Relay 路由
fn relay_routes() -> Router<Arc<WorkerState>> {
    Router::new()
        .route("/generate", post(handlers::generate))
        .route("/progress", get(handlers::progress))
}

/// Task 路由
fn task_routes() -> Router<Arc<OriginState>> {
    Router::new()
        .route("/submit", post(handlers::submit_task))
        .route("/get", post(handlers::get_task))
        .route("/list", post(handlers::list_tasks))
}
