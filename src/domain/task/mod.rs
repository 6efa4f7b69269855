//! Task Context - 中继任务限界上下文
//!
//! 职责:
//! - 任务聚合与状态机 (Pending -> Dispatched -> Completed | Failed)
//! - 租约（派发前占有，过期后可被重新占有）
//! - 附带的奖励描述

mod aggregate;
mod errors;
mod value_objects;

pub use aggregate::{Task, TaskParts, TaskSummary};
pub use errors::TaskError;
pub use value_objects::{Lease, RequesterId, RewardSpec, TaskId, TaskStatus};
