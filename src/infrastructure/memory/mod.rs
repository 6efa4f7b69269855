//! Memory Layer - In-Memory State Management
//!
//! 实现 TaskStore，单进程部署与测试使用

mod task_store;

pub use task_store::InMemoryTaskStore;
