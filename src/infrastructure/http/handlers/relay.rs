//! Relay Handlers - worker 侧接口

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::application::RelayJob;
use crate::infrastructure::http::dto::{ApiResponse, GenerationResultDto};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::WorkerState;

/// 执行一个中继任务并返回完整结果
pub async fn generate(
    State(state): State<Arc<WorkerState>>,
    Json(job): Json<RelayJob>,
) -> Result<Json<ApiResponse<GenerationResultDto>>, ApiError> {
    // 连接断开时 handler future 被丢弃，等待随之结束
    let cancel = state.shutdown.child_token();
    let result = state.service.generate(job, &cancel).await?;

    let dto = GenerationResultDto::encode(result)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(ApiResponse::success(dto)))
}

#[derive(Debug, Serialize)]
pub struct ProgressDto {
    pub progress: f64,
    pub eta_relative: f64,
    pub job_count: i64,
    pub idle: bool,
    pub busy: bool,
}

/// 后端进度快照，`busy` 表示本 worker 正在执行中继任务
pub async fn progress(
    State(state): State<Arc<WorkerState>>,
) -> Result<Json<ApiResponse<ProgressDto>>, ApiError> {
    let snapshot = state.service.progress().await?;

    Ok(Json(ApiResponse::success(ProgressDto {
        progress: snapshot.progress,
        eta_relative: snapshot.eta_relative,
        job_count: snapshot.job_count(),
        idle: snapshot.is_idle(),
        busy: state.service.is_busy(),
    })))
}
