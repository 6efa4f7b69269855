//! Relay - 两个角色的任务中继
//!
//! - OriginRelay: origin 侧占有任务并派发给 worker
//! - WorkerService: worker 侧单任务执行

mod origin;
mod role;
mod worker_service;

pub use origin::{OriginRelay, OriginRelayConfig};
pub use role::RelayRole;
pub use worker_service::WorkerService;
