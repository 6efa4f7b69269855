//! Relay Event Sink - 结构化观测事件

use chrono::{DateTime, Utc};
use serde::Serialize;

/// 中继与就绪轮询产生的事件
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayEvent {
    /// 后端仍有工作
    BackendBusy {
        progress: f64,
        job_count: i64,
        at: DateTime<Utc>,
    },
    /// 后端空闲
    BackendReady { at: DateTime<Utc> },
    TaskDispatched { task_id: String },
    TaskCompleted { task_id: String, result_ref: String },
    TaskFailed { task_id: String, error: String },
}

/// 事件接收端，发布不得阻塞调用方
pub trait RelayEventSink: Send + Sync {
    fn publish(&self, event: RelayEvent);
}
