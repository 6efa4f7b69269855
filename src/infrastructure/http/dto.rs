//! Data Transfer Objects

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::application::TaskResponse;
use crate::domain::generation::{GenerationRequest, GenerationResult};
use crate::domain::image::{CodecError, ImageCodec};
use crate::domain::task::RewardSpec;

// ============================================================================
// 统一响应结构
// ============================================================================

/// 统一 API 响应格式
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub errno: i32,
    pub error: String,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    /// 成功响应
    pub fn success(data: T) -> Self {
        Self {
            errno: 0,
            error: String::new(),
            data: Some(data),
        }
    }
}

// ============================================================================
// Worker DTOs
// ============================================================================

/// 生成结果，图像为 base64 PNG
#[derive(Debug, Serialize)]
pub struct GenerationResultDto {
    pub images: Vec<String>,
    pub info: Value,
    pub parameters: Value,
}

impl GenerationResultDto {
    /// 图像在阻塞线程池中并发编码
    pub async fn encode(result: GenerationResult) -> Result<Self, CodecError> {
        let images = ImageCodec::encode_all(&result.images).await?;
        Ok(Self {
            images,
            info: result.info,
            parameters: result.parameters,
        })
    }
}

// ============================================================================
// Task DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SubmitTaskRequest {
    pub requester: String,
    pub request: GenerationRequest,
    #[serde(default)]
    pub reward: Option<RewardSpec>,
}

#[derive(Debug, Deserialize)]
pub struct GetTaskRequest {
    pub task_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ListTasksRequest {
    pub requester: String,
}

#[derive(Debug, Serialize)]
pub struct TaskDto {
    pub task_id: String,
    pub requester: String,
    pub kind: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reward: Option<RewardSpec>,
    pub attempts: u32,
    pub created_at: String,
    pub updated_at: String,
}

impl From<TaskResponse> for TaskDto {
    fn from(task: TaskResponse) -> Self {
        Self {
            task_id: task.task_id.to_string(),
            requester: task.requester,
            kind: task.kind,
            status: task.status.as_str().to_string(),
            result_ref: task.result_ref,
            error: task.error,
            reward: task.reward,
            attempts: task.attempts,
            created_at: task.created_at.to_rfc3339(),
            updated_at: task.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TaskListDto {
    pub total: usize,
    pub tasks: Vec<TaskDto>,
}
