//! Relay Adapter - origin 侧到 worker 侧的派发实现

mod http_worker_client;

pub use http_worker_client::{HttpWorkerClient, HttpWorkerClientConfig};
