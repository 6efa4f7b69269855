//! 应用层 - 用例编排
//!
//! 包含：
//! - ports: 六边形架构端口定义（BackendTransport、TaskStore、WorkerDispatch 等）
//! - services: 面向生成后端的用例服务
//! - commands: CQRS 命令及处理器
//! - queries: CQRS 查询及处理器
//! - error: 应用层错误定义

pub mod commands;
pub mod error;
pub mod ports;
pub mod queries;
pub mod services;

// Re-exports
pub use commands::{
    handlers::SubmitTaskHandler,
    SubmitTask,
};

pub use error::ApplicationError;

pub use ports::{
    // Backend
    BackendError,
    BackendTransportPort,
    // Clock
    ClockPort,
    // Events
    RelayEvent,
    RelayEventSink,
    // Image store
    ImageStoreError,
    ImageStorePort,
    // Reward
    RewardError,
    RewardIssuerPort,
    // Task store
    TaskStoreError,
    TaskStorePort,
    // Worker dispatch
    RelayError,
    RelayJob,
    WorkerDispatchPort,
};

pub use queries::{
    handlers::{GetTaskHandler, ListTasksHandler, TaskResponse},
    GetTask,
    ListTasks,
};

pub use services::{
    BackendCatalog, GenerationClient, ModelResolver, ReadinessPoller, ReadinessPollerConfig,
};
