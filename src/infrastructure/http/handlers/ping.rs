//! 健康检查

use axum::Json;
use serde::Serialize;

use crate::infrastructure::http::dto::ApiResponse;

#[derive(Debug, Serialize)]
pub struct PingDto {
    pub service: &'static str,
    pub version: &'static str,
}

/// 两个角色共用，不访问后端
pub async fn ping() -> Json<ApiResponse<PingDto>> {
    Json(ApiResponse::success(PingDto {
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    }))
}
