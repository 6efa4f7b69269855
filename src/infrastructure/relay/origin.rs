//! Origin Relay - origin 侧派发循环
//!
//! 按提交顺序占有任务，派发给 worker 并等待完整结果。
//! 只有拿到完整结果后才会写图像、发奖励、标记完成；
//! 任一步失败都把任务标记为 Failed，然后继续下一个任务。

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::application::error::ApplicationError;
use crate::application::ports::{
    ClockPort, ImageStorePort, RelayEvent, RelayEventSink, RelayJob, RewardIssuerPort,
    TaskStoreError, TaskStorePort, WorkerDispatchPort,
};
use crate::domain::task::{Task, TaskId};

/// Origin 配置
#[derive(Debug, Clone)]
pub struct OriginRelayConfig {
    /// 租约持有者标识，多实例部署时必须唯一
    pub instance_id: String,
    /// 租约时长，应大于一次生成的最长耗时
    pub lease: Duration,
    /// 队列为空时的拉取间隔
    pub pull_interval: Duration,
}

impl Default for OriginRelayConfig {
    fn default() -> Self {
        Self {
            instance_id: format!("origin-{}", uuid::Uuid::new_v4()),
            lease: Duration::from_secs(900),
            pull_interval: Duration::from_secs(2),
        }
    }
}

/// Origin 派发器
pub struct OriginRelay {
    config: OriginRelayConfig,
    store: Arc<dyn TaskStorePort>,
    dispatcher: Arc<dyn WorkerDispatchPort>,
    image_store: Arc<dyn ImageStorePort>,
    reward_issuer: Arc<dyn RewardIssuerPort>,
    events: Arc<dyn RelayEventSink>,
    clock: Arc<dyn ClockPort>,
}

impl OriginRelay {
    pub fn new(
        config: OriginRelayConfig,
        store: Arc<dyn TaskStorePort>,
        dispatcher: Arc<dyn WorkerDispatchPort>,
        image_store: Arc<dyn ImageStorePort>,
        reward_issuer: Arc<dyn RewardIssuerPort>,
        events: Arc<dyn RelayEventSink>,
        clock: Arc<dyn ClockPort>,
    ) -> Self {
        Self {
            config,
            store,
            dispatcher,
            image_store,
            reward_issuer,
            events,
            clock,
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.config.instance_id
    }

    /// 持续派发直到取消
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(
            instance_id = %self.config.instance_id,
            lease_secs = self.config.lease.as_secs(),
            "OriginRelay started"
        );

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let processed = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                processed = self.process_next() => processed,
            };

            match processed {
                Ok(Some(_)) => continue,
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(error = %e, "Failed to claim next task");
                }
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = self.clock.sleep(self.config.pull_interval) => {}
            }
        }

        tracing::info!(instance_id = %self.config.instance_id, "OriginRelay stopped");
    }

    /// 处理一个任务
    ///
    /// 返回 `Ok(None)` 表示当前没有可派发任务；
    /// 任务本身的失败记录在任务上，不会作为错误返回。
    pub async fn process_next(&self) -> Result<Option<TaskId>, ApplicationError> {
        let owner = self.config.instance_id.as_str();
        let task = match self.store.claim_next(owner, self.config.lease).await? {
            Some(task) => task,
            None => return Ok(None),
        };
        let task_id = *task.id();

        self.events.publish(RelayEvent::TaskDispatched {
            task_id: task_id.to_string(),
        });
        tracing::info!(
            task_id = %task_id,
            kind = task.request().kind(),
            attempts = task.attempts(),
            "Task dispatched"
        );

        match self.execute(&task).await {
            Ok(result_ref) => match self.store.complete(&task_id, owner, &result_ref).await {
                Ok(()) => {
                    self.events.publish(RelayEvent::TaskCompleted {
                        task_id: task_id.to_string(),
                        result_ref: result_ref.clone(),
                    });
                    tracing::info!(task_id = %task_id, result_ref = %result_ref, "Task completed");
                }
                Err(e) => self.log_store_error(&task_id, "complete", e),
            },
            Err(e) => {
                let error = e.to_string();
                tracing::error!(task_id = %task_id, kind = e.kind(), error = %error, "Task failed");
                match self.store.fail(&task_id, owner, &error).await {
                    Ok(()) => {
                        self.events.publish(RelayEvent::TaskFailed {
                            task_id: task_id.to_string(),
                            error,
                        });
                    }
                    Err(e) => self.log_store_error(&task_id, "fail", e),
                }
            }
        }

        Ok(Some(task_id))
    }

    async fn execute(&self, task: &Task) -> Result<String, ApplicationError> {
        let job = RelayJob {
            task_id: task.id().to_string(),
            request: task.request().clone(),
        };
        let result = self.dispatcher.dispatch(&job).await?;

        let result_ref = self.image_store.save(&job.task_id, &result.images).await?;

        if let Some(reward) = task.reward() {
            let receipt = self
                .reward_issuer
                .issue(task.requester(), reward, &result_ref)
                .await?;
            tracing::info!(
                task_id = %task.id(),
                requester = %task.requester(),
                receipt = %receipt,
                "Reward issued"
            );
        }

        Ok(result_ref)
    }

    fn log_store_error(&self, task_id: &TaskId, action: &str, error: TaskStoreError) {
        match error {
            TaskStoreError::LeaseLost { .. } => {
                // 租约已过期并被其他实例重新占有，结果以对方为准
                tracing::warn!(task_id = %task_id, action, "Lease lost, dropping outcome");
            }
            other => {
                tracing::error!(task_id = %task_id, action, error = %other, "Failed to record task outcome");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{ImageStoreError, RelayError, RewardError};
    use crate::domain::generation::{GenerationRequest, GenerationResult, Txt2ImgOptions};
    use crate::domain::image::ImageHandle;
    use crate::domain::task::{RequesterId, RewardSpec, TaskStatus};
    use crate::infrastructure::adapters::SystemClock;
    use crate::infrastructure::memory::InMemoryTaskStore;
    use async_trait::async_trait;
    use image::DynamicImage;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct ScriptedWorker {
        replies: Mutex<VecDeque<Result<GenerationResult, RelayError>>>,
        jobs: Mutex<Vec<String>>,
    }

    impl ScriptedWorker {
        fn new(replies: Vec<Result<GenerationResult, RelayError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                jobs: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl WorkerDispatchPort for ScriptedWorker {
        async fn dispatch(&self, job: &RelayJob) -> Result<GenerationResult, RelayError> {
            self.jobs.lock().unwrap().push(job.task_id.clone());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(RelayError::Unreachable("no script".to_string())))
        }
    }

    #[derive(Default)]
    struct MemoryImages {
        saved: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ImageStorePort for MemoryImages {
        async fn save(&self, task_id: &str, images: &[ImageHandle]) -> Result<String, ImageStoreError> {
            if images.is_empty() {
                return Err(ImageStoreError::Empty(task_id.to_string()));
            }
            let result_ref = format!("{}/image_0.png", task_id);
            self.saved.lock().unwrap().push(result_ref.clone());
            Ok(result_ref)
        }
    }

    #[derive(Default)]
    struct CountingRewards {
        issued: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl RewardIssuerPort for CountingRewards {
        async fn issue(
            &self,
            requester: &RequesterId,
            reward: &RewardSpec,
            _result_ref: &str,
        ) -> Result<String, RewardError> {
            if reward.amount == 0 {
                return Err(RewardError::Rejected("zero amount".to_string()));
            }
            self.issued.lock().unwrap().push(requester.to_string());
            Ok("receipt".to_string())
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<RelayEvent>>,
    }

    impl RelayEventSink for RecordingSink {
        fn publish(&self, event: RelayEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    fn generated() -> GenerationResult {
        GenerationResult {
            images: vec![ImageHandle::new(DynamicImage::new_rgb8(2, 2))],
            ..Default::default()
        }
    }

    fn task(reward: Option<u64>) -> Task {
        Task::new(
            RequesterId::new("0xabc").unwrap(),
            GenerationRequest::TextToImage(Txt2ImgOptions::default()),
            reward.map(|amount| RewardSpec {
                kind: "token".to_string(),
                amount,
                memo: None,
            }),
        )
    }

    struct Harness {
        store: Arc<InMemoryTaskStore>,
        worker: Arc<ScriptedWorker>,
        images: Arc<MemoryImages>,
        rewards: Arc<CountingRewards>,
        sink: Arc<RecordingSink>,
        relay: OriginRelay,
    }

    fn harness(replies: Vec<Result<GenerationResult, RelayError>>) -> Harness {
        let store = Arc::new(InMemoryTaskStore::new());
        let worker = Arc::new(ScriptedWorker::new(replies));
        let images = Arc::new(MemoryImages::default());
        let rewards = Arc::new(CountingRewards::default());
        let sink = Arc::new(RecordingSink::default());
        let relay = OriginRelay::new(
            OriginRelayConfig {
                instance_id: "origin-test".to_string(),
                ..Default::default()
            },
            store.clone(),
            worker.clone(),
            images.clone(),
            rewards.clone(),
            sink.clone(),
            Arc::new(SystemClock),
        );
        Harness {
            store,
            worker,
            images,
            rewards,
            sink,
            relay,
        }
    }

    #[tokio::test]
    async fn test_empty_queue() {
        let h = harness(vec![]);
        assert_eq!(h.relay.process_next().await.unwrap(), None);
        assert!(h.worker.jobs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_success_saves_image_and_issues_reward() {
        let h = harness(vec![Ok(generated())]);
        let t = task(Some(5));
        h.store.enqueue(&t).await.unwrap();

        let processed = h.relay.process_next().await.unwrap();
        assert_eq!(processed, Some(*t.id()));

        let stored = h.store.find_by_id(t.id()).await.unwrap().unwrap();
        assert_eq!(stored.status(), TaskStatus::Completed);
        assert_eq!(stored.result_ref(), Some(format!("{}/image_0.png", t.id()).as_str()));
        assert_eq!(*h.rewards.issued.lock().unwrap(), vec!["0xabc".to_string()]);

        let events = h.sink.events.lock().unwrap();
        assert!(matches!(events[0], RelayEvent::TaskDispatched { .. }));
        assert!(matches!(events[1], RelayEvent::TaskCompleted { .. }));
    }

    #[tokio::test]
    async fn test_failure_is_recorded_and_next_task_succeeds() {
        let h = harness(vec![
            Err(RelayError::Rejected("CUDA out of memory".to_string())),
            Ok(generated()),
        ]);
        let first = task(None);
        let second = task(None);
        h.store.enqueue(&first).await.unwrap();
        h.store.enqueue(&second).await.unwrap();

        assert_eq!(h.relay.process_next().await.unwrap(), Some(*first.id()));
        assert_eq!(h.relay.process_next().await.unwrap(), Some(*second.id()));

        let failed = h.store.find_by_id(first.id()).await.unwrap().unwrap();
        assert_eq!(failed.status(), TaskStatus::Failed);
        assert!(failed.error().unwrap().contains("CUDA out of memory"));

        let done = h.store.find_by_id(second.id()).await.unwrap().unwrap();
        assert_eq!(done.status(), TaskStatus::Completed);
        assert_eq!(h.images.saved.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reward_failure_marks_task_failed() {
        let h = harness(vec![Ok(generated())]);
        let t = task(Some(0));
        h.store.enqueue(&t).await.unwrap();

        h.relay.process_next().await.unwrap();

        let stored = h.store.find_by_id(t.id()).await.unwrap().unwrap();
        assert_eq!(stored.status(), TaskStatus::Failed);
        let events = h.sink.events.lock().unwrap();
        assert!(matches!(events.last(), Some(RelayEvent::TaskFailed { .. })));
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let h = harness(vec![]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        // 已取消时立即返回
        h.relay.run(cancel).await;
        assert!(h.worker.jobs.lock().unwrap().is_empty());
    }
}
