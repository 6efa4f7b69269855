//! Application Ports - 出站端口定义
//!
//! 定义应用层与基础设施层的抽象接口

mod backend_transport;
mod clock;
mod event_sink;
mod image_store;
mod reward_issuer;
mod task_store;
mod worker_dispatch;

pub use backend_transport::{BackendError, BackendTransportPort};
pub use clock::ClockPort;
pub use event_sink::{RelayEvent, RelayEventSink};
pub use image_store::{ImageStoreError, ImageStorePort};
pub use reward_issuer::{RewardError, RewardIssuerPort};
pub use task_store::{TaskStoreError, TaskStorePort};
pub use worker_dispatch::{RelayError, RelayJob, WorkerDispatchPort};
