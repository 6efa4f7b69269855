//! Task Context - Aggregate Root

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Lease, RequesterId, RewardSpec, TaskError, TaskId, TaskStatus};
use crate::domain::generation::GenerationRequest;

/// Task 聚合根
///
/// 不变量:
/// - 只有 Dispatched 状态持有租约
/// - 完成/失败只能由当前租约持有者提交
/// - Completed 一定带有结果引用，Failed 一定带有错误信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    requester: RequesterId,
    request: GenerationRequest,
    reward: Option<RewardSpec>,
    status: TaskStatus,
    lease: Option<Lease>,
    result_ref: Option<String>,
    error: Option<String>,
    attempts: u32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// 持久化层重建聚合时使用的完整字段
#[derive(Debug, Clone)]
pub struct TaskParts {
    pub id: TaskId,
    pub requester: RequesterId,
    pub request: GenerationRequest,
    pub reward: Option<RewardSpec>,
    pub status: TaskStatus,
    pub lease: Option<Lease>,
    pub result_ref: Option<String>,
    pub error: Option<String>,
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// 创建待派发任务
    pub fn new(requester: RequesterId, request: GenerationRequest, reward: Option<RewardSpec>) -> Self {
        let now = Utc::now();
        Self {
            id: TaskId::new(),
            requester,
            request,
            reward,
            status: TaskStatus::Pending,
            lease: None,
            result_ref: None,
            error: None,
            attempts: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// 从持久化数据重建
    pub fn from_parts(parts: TaskParts) -> Self {
        Self {
            id: parts.id,
            requester: parts.requester,
            request: parts.request,
            reward: parts.reward,
            status: parts.status,
            lease: parts.lease,
            result_ref: parts.result_ref,
            error: parts.error,
            attempts: parts.attempts,
            created_at: parts.created_at,
            updated_at: parts.updated_at,
        }
    }

    /// 在 `now` 时刻能否被占有: Pending，或 Dispatched 且租约已过期
    pub fn is_claimable(&self, now: DateTime<Utc>) -> bool {
        match self.status {
            TaskStatus::Pending => true,
            TaskStatus::Dispatched => self
                .lease
                .as_ref()
                .map(|lease| lease.is_expired(now))
                .unwrap_or(true),
            TaskStatus::Completed | TaskStatus::Failed => false,
        }
    }

    /// 占有任务并进入 Dispatched
    pub fn claim(&mut self, lease: Lease, now: DateTime<Utc>) -> Result<(), TaskError> {
        if !self.is_claimable(now) {
            return Err(self.invalid_transition("claim"));
        }
        self.status = TaskStatus::Dispatched;
        self.lease = Some(lease);
        self.attempts += 1;
        self.updated_at = now;
        Ok(())
    }

    /// 标记完成
    pub fn complete(&mut self, owner: &str, result_ref: String) -> Result<(), TaskError> {
        self.ensure_lease_holder(owner, "complete")?;
        self.status = TaskStatus::Completed;
        self.lease = None;
        self.result_ref = Some(result_ref);
        self.error = None;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// 标记失败
    pub fn fail(&mut self, owner: &str, error: String) -> Result<(), TaskError> {
        self.ensure_lease_holder(owner, "fail")?;
        self.status = TaskStatus::Failed;
        self.lease = None;
        self.error = Some(error);
        self.updated_at = Utc::now();
        Ok(())
    }

    fn ensure_lease_holder(&self, owner: &str, action: &'static str) -> Result<(), TaskError> {
        if self.status != TaskStatus::Dispatched {
            return Err(self.invalid_transition(action));
        }
        match &self.lease {
            Some(lease) if lease.is_held_by(owner) => Ok(()),
            _ => Err(TaskError::LeaseLost {
                task_id: self.id.to_string(),
                owner: owner.to_string(),
            }),
        }
    }

    fn invalid_transition(&self, action: &'static str) -> TaskError {
        TaskError::InvalidTransition {
            task_id: self.id.to_string(),
            from: self.status.as_str(),
            action,
        }
    }

    // Getters
    pub fn id(&self) -> &TaskId {
        &self.id
    }

    pub fn requester(&self) -> &RequesterId {
        &self.requester
    }

    pub fn request(&self) -> &GenerationRequest {
        &self.request
    }

    pub fn reward(&self) -> Option<&RewardSpec> {
        self.reward.as_ref()
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn lease(&self) -> Option<&Lease> {
        self.lease.as_ref()
    }

    pub fn result_ref(&self) -> Option<&str> {
        self.result_ref.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn summary(&self) -> TaskSummary {
        TaskSummary {
            id: self.id,
            requester: self.requester.clone(),
            kind: self.request.kind().to_string(),
            reward: self.reward.clone(),
            status: self.status,
            result_ref: self.result_ref.clone(),
            error: self.error.clone(),
            attempts: self.attempts,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// 任务概要，不含生成请求本身
///
/// 查询接口只需要展示状态，读取概要不必反序列化请求中的图像
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSummary {
    pub id: TaskId,
    pub requester: RequesterId,
    pub kind: String,
    pub reward: Option<RewardSpec>,
    pub status: TaskStatus,
    pub result_ref: Option<String>,
    pub error: Option<String>,
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::generation::{Img2ImgOptions, InterrogateOptions, Txt2ImgOptions};
    use crate::domain::image::ImageHandle;
    use chrono::Duration;
    use image::{DynamicImage, RgbImage};

    fn task() -> Task {
        Task::new(
            RequesterId::new("0xabc").unwrap(),
            GenerationRequest::TextToImage(Txt2ImgOptions::default()),
            None,
        )
    }

    #[test]
    fn test_lifecycle_to_completed() {
        let now = Utc::now();
        let mut task = task();
        assert_eq!(task.status(), TaskStatus::Pending);
        assert!(task.is_claimable(now));

        task.claim(Lease::new("origin-a", now + Duration::seconds(60)), now)
            .unwrap();
        assert_eq!(task.status(), TaskStatus::Dispatched);
        assert_eq!(task.attempts(), 1);
        assert!(!task.is_claimable(now));

        task.complete("origin-a", "images/1.png".to_string()).unwrap();
        assert_eq!(task.status(), TaskStatus::Completed);
        assert_eq!(task.result_ref(), Some("images/1.png"));
        assert!(task.lease().is_none());
        assert!(!task.is_claimable(now + Duration::days(1)));
    }

    #[test]
    fn test_expired_lease_can_be_reclaimed() {
        let now = Utc::now();
        let mut task = task();
        task.claim(Lease::new("origin-a", now + Duration::seconds(10)), now)
            .unwrap();

        let later = now + Duration::seconds(11);
        assert!(task.is_claimable(later));
        task.claim(Lease::new("origin-b", later + Duration::seconds(10)), later)
            .unwrap();
        assert_eq!(task.attempts(), 2);

        // 原持有者的结果不能覆盖
        assert!(matches!(
            task.complete("origin-a", "stale.png".to_string()),
            Err(TaskError::LeaseLost { .. })
        ));
        task.fail("origin-b", "backend unreachable".to_string()).unwrap();
        assert_eq!(task.status(), TaskStatus::Failed);
        assert_eq!(task.error(), Some("backend unreachable"));
    }

    #[test]
    fn test_complete_requires_dispatch() {
        let mut task = task();
        assert!(matches!(
            task.complete("origin-a", "x.png".to_string()),
            Err(TaskError::InvalidTransition { from: "pending", .. })
        ));
    }

    #[test]
    fn test_serde_keeps_request() {
        let request = GenerationRequest::Interrogate(InterrogateOptions {
            image: ImageHandle::encoded("aVZCT1J3MEtHZ289"),
            model: Some("deepdanbooru".to_string()),
        });
        let task = Task::new(RequesterId::new("u1").unwrap(), request, None);
        let json = serde_json::to_string(&task).unwrap();
        let back: Task = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id(), task.id());
        assert_eq!(back.request().kind(), "interrogate");
    }

    #[test]
    fn test_summary_mirrors_state() {
        let now = Utc::now();
        let mut task = Task::new(
            RequesterId::new("u1").unwrap(),
            GenerationRequest::ImageToImage(Img2ImgOptions {
                init_images: vec![ImageHandle::new(DynamicImage::ImageRgb8(RgbImage::new(2, 2)))],
                ..Default::default()
            }),
            None,
        );
        task.claim(Lease::new("origin-a", now + Duration::seconds(60)), now)
            .unwrap();
        task.fail("origin-a", "boom".to_string()).unwrap();

        let summary = task.summary();
        assert_eq!(summary.id, *task.id());
        assert_eq!(summary.kind, "image_to_image");
        assert_eq!(summary.status, TaskStatus::Failed);
        assert_eq!(summary.error.as_deref(), Some("boom"));
        assert_eq!(summary.attempts, 1);
    }
}
