//! In-Memory Task Store Implementation
//!
//! 单进程内的任务队列，租约语义与 SQLite 实现一致

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::application::ports::{ClockPort, TaskStoreError, TaskStorePort};
use crate::domain::task::{Lease, RequesterId, Task, TaskId, TaskSummary};
use crate::infrastructure::adapters::SystemClock;

struct Entry {
    /// 入队序号，创建时间相同时保证先进先出
    seq: u64,
    task: Task,
}

/// 内存任务存储
pub struct InMemoryTaskStore {
    /// task_id -> Entry
    tasks: DashMap<TaskId, Entry>,
    next_seq: AtomicU64,
    clock: Arc<dyn ClockPort>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn ClockPort>) -> Self {
        Self {
            tasks: DashMap::new(),
            next_seq: AtomicU64::new(0),
            clock,
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl Default for InMemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

fn lease_until(now: DateTime<Utc>, lease: Duration) -> Result<DateTime<Utc>, TaskStoreError> {
    ChronoDuration::from_std(lease)
        .ok()
        .and_then(|d| now.checked_add_signed(d))
        .ok_or_else(|| TaskStoreError::InvalidState(format!("lease too long: {:?}", lease)))
}

#[async_trait]
impl TaskStorePort for InMemoryTaskStore {
    async fn enqueue(&self, task: &Task) -> Result<(), TaskStoreError> {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        self.tasks.insert(
            *task.id(),
            Entry {
                seq,
                task: task.clone(),
            },
        );
        tracing::debug!(task_id = %task.id(), "Task enqueued");
        Ok(())
    }

    async fn claim_next(&self, owner: &str, lease: Duration) -> Result<Option<Task>, TaskStoreError> {
        let now = self.clock.now();
        let expires_at = lease_until(now, lease)?;

        // 先按顺序收集候选，再在条目锁内重新检查并占有
        let mut candidates: Vec<(DateTime<Utc>, u64, TaskId)> = self
            .tasks
            .iter()
            .filter(|entry| entry.task.is_claimable(now))
            .map(|entry| (entry.task.created_at(), entry.seq, *entry.key()))
            .collect();
        candidates.sort();

        for (_, _, id) in candidates {
            if let Some(mut entry) = self.tasks.get_mut(&id) {
                if !entry.task.is_claimable(now) {
                    continue;
                }
                entry.task.claim(Lease::new(owner, expires_at), now)?;
                tracing::debug!(task_id = %id, owner, "Task claimed");
                return Ok(Some(entry.task.clone()));
            }
        }

        Ok(None)
    }

    async fn complete(&self, id: &TaskId, owner: &str, result_ref: &str) -> Result<(), TaskStoreError> {
        let mut entry = self
            .tasks
            .get_mut(id)
            .ok_or_else(|| TaskStoreError::NotFound(id.to_string()))?;
        entry.task.complete(owner, result_ref.to_string())?;
        Ok(())
    }

    async fn fail(&self, id: &TaskId, owner: &str, error: &str) -> Result<(), TaskStoreError> {
        let mut entry = self
            .tasks
            .get_mut(id)
            .ok_or_else(|| TaskStoreError::NotFound(id.to_string()))?;
        entry.task.fail(owner, error.to_string())?;
        Ok(())
    }

    async fn find_by_id(&self, id: &TaskId) -> Result<Option<Task>, TaskStoreError> {
        Ok(self.tasks.get(id).map(|entry| entry.task.clone()))
    }

    async fn find_summary(&self, id: &TaskId) -> Result<Option<TaskSummary>, TaskStoreError> {
        Ok(self.tasks.get(id).map(|entry| entry.task.summary()))
    }

    async fn list_by_requester(
        &self,
        requester: &RequesterId,
    ) -> Result<Vec<TaskSummary>, TaskStoreError> {
        let mut tasks: Vec<(u64, TaskSummary)> = self
            .tasks
            .iter()
            .filter(|entry| entry.task.requester() == requester)
            .map(|entry| (entry.seq, entry.task.summary()))
            .collect();
        // 最新的在前
        tasks.sort_by(|a, b| b.1.created_at.cmp(&a.1.created_at).then(b.0.cmp(&a.0)));
        Ok(tasks.into_iter().map(|(_, task)| task).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::generation::{GenerationRequest, Txt2ImgOptions};
    use crate::domain::task::TaskStatus;
    use std::sync::Mutex;

    /// 可手动推进的时钟
    struct SteppedClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl SteppedClock {
        fn advance(&self, secs: i64) {
            let mut now = self.now.lock().unwrap();
            *now = *now + ChronoDuration::seconds(secs);
        }
    }

    #[async_trait]
    impl ClockPort for SteppedClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }

        async fn sleep(&self, _duration: Duration) {}
    }

    fn task() -> Task {
        Task::new(
            RequesterId::new("0xabc").unwrap(),
            GenerationRequest::TextToImage(Txt2ImgOptions::default()),
            None,
        )
    }

    #[tokio::test]
    async fn test_claim_in_submission_order() {
        let store = InMemoryTaskStore::new();
        let first = task();
        let second = task();
        store.enqueue(&first).await.unwrap();
        store.enqueue(&second).await.unwrap();

        let lease = Duration::from_secs(60);
        let claimed = store.claim_next("a", lease).await.unwrap().unwrap();
        assert_eq!(claimed.id(), first.id());
        assert_eq!(claimed.status(), TaskStatus::Dispatched);

        let claimed = store.claim_next("b", lease).await.unwrap().unwrap();
        assert_eq!(claimed.id(), second.id());

        // 两个任务都在租约中，不能再被占有
        assert!(store.claim_next("c", lease).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_lease_is_reclaimed_and_stale_owner_rejected() {
        let clock = Arc::new(SteppedClock {
            now: Mutex::new(Utc::now()),
        });
        let store = InMemoryTaskStore::with_clock(clock.clone());
        let t = task();
        store.enqueue(&t).await.unwrap();

        let lease = Duration::from_secs(30);
        store.claim_next("origin-a", lease).await.unwrap().unwrap();
        assert!(store.claim_next("origin-b", lease).await.unwrap().is_none());

        clock.advance(31);
        let reclaimed = store.claim_next("origin-b", lease).await.unwrap().unwrap();
        assert_eq!(reclaimed.attempts(), 2);

        let stale = store.complete(t.id(), "origin-a", "late.png").await;
        assert!(matches!(stale, Err(TaskStoreError::LeaseLost { .. })));

        store.complete(t.id(), "origin-b", "t/image_0.png").await.unwrap();
        let done = store.find_by_id(t.id()).await.unwrap().unwrap();
        assert_eq!(done.status(), TaskStatus::Completed);
        assert_eq!(done.result_ref(), Some("t/image_0.png"));
    }

    #[tokio::test]
    async fn test_concurrent_claims_never_share_a_task() {
        let store = Arc::new(InMemoryTaskStore::new());
        for _ in 0..20 {
            store.enqueue(&task()).await.unwrap();
        }

        let mut handles = Vec::new();
        for worker in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let owner = format!("origin-{}", worker);
                let mut claimed = Vec::new();
                while let Some(task) = store
                    .claim_next(&owner, Duration::from_secs(60))
                    .await
                    .unwrap()
                {
                    claimed.push(*task.id());
                }
                claimed
            }));
        }

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }
        all.sort();
        let before = all.len();
        all.dedup();
        assert_eq!(before, 20);
        assert_eq!(all.len(), 20);
    }

    #[tokio::test]
    async fn test_missing_task() {
        let store = InMemoryTaskStore::new();
        let result = store.fail(&TaskId::new(), "a", "boom").await;
        assert!(matches!(result, Err(TaskStoreError::NotFound(_))));
    }
}
