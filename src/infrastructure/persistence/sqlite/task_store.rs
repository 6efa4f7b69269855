//! SQLite Task Store Implementation
//!
//! 多个 origin 实例可以共享同一个数据库文件，占有任务通过单条
//! `UPDATE ... RETURNING` 完成，不会出现两个实例同时持有同一任务。

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, SecondsFormat, Utc};
use sqlx::FromRow;
use std::sync::Arc;
use std::time::Duration;

use super::database::DbPool;
use crate::application::ports::{ClockPort, TaskStoreError, TaskStorePort};
use crate::domain::task::{
    Lease, RequesterId, RewardSpec, Task, TaskId, TaskParts, TaskStatus, TaskSummary,
};
use crate::infrastructure::adapters::SystemClock;

const TASK_COLUMNS: &str = "id, requester, request, reward, status, lease_owner, \
    lease_expires_at, result_ref, error, attempts, created_at, updated_at";

/// 概要查询不读取 request 列
const SUMMARY_COLUMNS: &str = "id, requester, kind, reward, status, result_ref, error, \
    attempts, created_at, updated_at";

/// 数据库行结构
#[derive(Debug, FromRow)]
struct TaskRow {
    id: String,
    requester: String,
    request: String,
    reward: Option<String>,
    status: String,
    lease_owner: Option<String>,
    lease_expires_at: Option<String>,
    result_ref: Option<String>,
    error: Option<String>,
    attempts: i64,
    created_at: String,
    updated_at: String,
}

#[derive(Debug, FromRow)]
struct SummaryRow {
    id: String,
    requester: String,
    kind: String,
    reward: Option<String>,
    status: String,
    result_ref: Option<String>,
    error: Option<String>,
    attempts: i64,
    created_at: String,
    updated_at: String,
}

fn parse_time(value: &str) -> Result<DateTime<Utc>, TaskStoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| TaskStoreError::Serialization(format!("bad timestamp {}: {}", value, e)))
}

/// 固定宽度的 RFC3339，字符串比较与时间先后一致
fn format_time(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_id(value: &str) -> Result<TaskId, TaskStoreError> {
    TaskId::parse(value)
        .ok_or_else(|| TaskStoreError::Serialization(format!("bad task id: {}", value)))
}

fn parse_requester(value: String) -> Result<RequesterId, TaskStoreError> {
    RequesterId::new(value).map_err(|e| TaskStoreError::Serialization(e.to_string()))
}

fn parse_reward(value: Option<&str>) -> Result<Option<RewardSpec>, TaskStoreError> {
    value
        .map(serde_json::from_str)
        .transpose()
        .map_err(|e| TaskStoreError::Serialization(e.to_string()))
}

fn parse_status(value: &str) -> Result<TaskStatus, TaskStoreError> {
    TaskStatus::from_str(value)
        .ok_or_else(|| TaskStoreError::Serialization(format!("bad status: {}", value)))
}

impl TryFrom<TaskRow> for Task {
    type Error = TaskStoreError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let id = parse_id(&row.id)?;
        let requester = parse_requester(row.requester)?;
        let request = serde_json::from_str(&row.request)
            .map_err(|e| TaskStoreError::Serialization(e.to_string()))?;
        let reward = parse_reward(row.reward.as_deref())?;
        let status = parse_status(&row.status)?;
        let lease = match (row.lease_owner, row.lease_expires_at) {
            (Some(owner), Some(expires_at)) => Some(Lease::new(owner, parse_time(&expires_at)?)),
            _ => None,
        };

        Ok(Task::from_parts(TaskParts {
            id,
            requester,
            request,
            reward,
            status,
            lease,
            result_ref: row.result_ref,
            error: row.error,
            attempts: u32::try_from(row.attempts).unwrap_or(0),
            created_at: parse_time(&row.created_at)?,
            updated_at: parse_time(&row.updated_at)?,
        }))
    }
}

impl TryFrom<SummaryRow> for TaskSummary {
    type Error = TaskStoreError;

    fn try_from(row: SummaryRow) -> Result<Self, Self::Error> {
        Ok(TaskSummary {
            id: parse_id(&row.id)?,
            requester: parse_requester(row.requester)?,
            kind: row.kind,
            reward: parse_reward(row.reward.as_deref())?,
            status: parse_status(&row.status)?,
            result_ref: row.result_ref,
            error: row.error,
            attempts: u32::try_from(row.attempts).unwrap_or(0),
            created_at: parse_time(&row.created_at)?,
            updated_at: parse_time(&row.updated_at)?,
        })
    }
}

fn db_err(e: sqlx::Error) -> TaskStoreError {
    TaskStoreError::Database(e.to_string())
}

/// SQLite 任务存储
pub struct SqliteTaskStore {
    pool: DbPool,
    clock: Arc<dyn ClockPort>,
}

impl SqliteTaskStore {
    pub fn new(pool: DbPool) -> Self {
        Self::with_clock(pool, Arc::new(SystemClock))
    }

    pub fn with_clock(pool: DbPool, clock: Arc<dyn ClockPort>) -> Self {
        Self { pool, clock }
    }

    /// complete/fail 未命中时区分不存在和租约丢失
    async fn miss_reason(&self, id: &TaskId, owner: &str) -> TaskStoreError {
        match self.find_summary(id).await {
            Ok(Some(_)) => TaskStoreError::LeaseLost {
                task_id: id.to_string(),
                owner: owner.to_string(),
            },
            Ok(None) => TaskStoreError::NotFound(id.to_string()),
            Err(e) => e,
        }
    }
}

#[async_trait]
impl TaskStorePort for SqliteTaskStore {
    async fn enqueue(&self, task: &Task) -> Result<(), TaskStoreError> {
        let request = serde_json::to_string(task.request())
            .map_err(|e| TaskStoreError::Serialization(e.to_string()))?;
        let reward = task
            .reward()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| TaskStoreError::Serialization(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO tasks (id, requester, kind, request, reward, status, lease_owner,
                lease_expires_at, result_ref, error, attempts, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(task.id().to_string())
        .bind(task.requester().as_str())
        .bind(task.request().kind())
        .bind(request)
        .bind(reward)
        .bind(task.status().as_str())
        .bind(task.lease().map(|l| l.owner.clone()))
        .bind(task.lease().map(|l| format_time(l.expires_at)))
        .bind(task.result_ref())
        .bind(task.error())
        .bind(task.attempts() as i64)
        .bind(format_time(task.created_at()))
        .bind(format_time(task.updated_at()))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        tracing::debug!(task_id = %task.id(), kind = task.request().kind(), "Task enqueued");
        Ok(())
    }

    async fn claim_next(&self, owner: &str, lease: Duration) -> Result<Option<Task>, TaskStoreError> {
        let now = self.clock.now();
        let expires_at = ChronoDuration::from_std(lease)
            .ok()
            .and_then(|d| now.checked_add_signed(d))
            .ok_or_else(|| TaskStoreError::InvalidState(format!("lease too long: {:?}", lease)))?;
        let now_str = format_time(now);

        let sql = format!(
            r#"
            UPDATE tasks
            SET status = 'dispatched', lease_owner = ?, lease_expires_at = ?,
                attempts = attempts + 1, updated_at = ?
            WHERE id = (
                SELECT id FROM tasks
                WHERE status = 'pending'
                   OR (status = 'dispatched'
                       AND (lease_expires_at IS NULL OR lease_expires_at <= ?))
                ORDER BY created_at, rowid
                LIMIT 1
            )
            RETURNING {}
            "#,
            TASK_COLUMNS
        );

        let row = sqlx::query_as::<_, TaskRow>(&sql)
            .bind(owner)
            .bind(format_time(expires_at))
            .bind(&now_str)
            .bind(&now_str)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        match row {
            Some(row) => {
                let task = Task::try_from(row)?;
                tracing::debug!(task_id = %task.id(), owner, attempts = task.attempts(), "Task claimed");
                Ok(Some(task))
            }
            None => Ok(None),
        }
    }

    async fn complete(&self, id: &TaskId, owner: &str, result_ref: &str) -> Result<(), TaskStoreError> {
        let result = sqlx::query(
            r#"
            UPDATE tasks
            SET status = 'completed', lease_owner = NULL, lease_expires_at = NULL,
                result_ref = ?, error = NULL, updated_at = ?
            WHERE id = ? AND status = 'dispatched' AND lease_owner = ?
            "#,
        )
        .bind(result_ref)
        .bind(format_time(self.clock.now()))
        .bind(id.to_string())
        .bind(owner)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(self.miss_reason(id, owner).await);
        }
        Ok(())
    }

    async fn fail(&self, id: &TaskId, owner: &str, error: &str) -> Result<(), TaskStoreError> {
        let result = sqlx::query(
            r#"
            UPDATE tasks
            SET status = 'failed', lease_owner = NULL, lease_expires_at = NULL,
                error = ?, updated_at = ?
            WHERE id = ? AND status = 'dispatched' AND lease_owner = ?
            "#,
        )
        .bind(error)
        .bind(format_time(self.clock.now()))
        .bind(id.to_string())
        .bind(owner)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(self.miss_reason(id, owner).await);
        }
        Ok(())
    }

    async fn find_by_id(&self, id: &TaskId) -> Result<Option<Task>, TaskStoreError> {
        let sql = format!("SELECT {} FROM tasks WHERE id = ?", TASK_COLUMNS);
        let row = sqlx::query_as::<_, TaskRow>(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.map(Task::try_from).transpose()
    }

    async fn find_summary(&self, id: &TaskId) -> Result<Option<TaskSummary>, TaskStoreError> {
        let sql = format!("SELECT {} FROM tasks WHERE id = ?", SUMMARY_COLUMNS);
        let row = sqlx::query_as::<_, SummaryRow>(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.map(TaskSummary::try_from).transpose()
    }

    async fn list_by_requester(
        &self,
        requester: &RequesterId,
    ) -> Result<Vec<TaskSummary>, TaskStoreError> {
        let sql = format!(
            "SELECT {} FROM tasks WHERE requester = ? ORDER BY created_at DESC, rowid DESC",
            SUMMARY_COLUMNS
        );
        let rows = sqlx::query_as::<_, SummaryRow>(&sql)
            .bind(requester.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.into_iter().map(TaskSummary::try_from).collect()
    }
}
