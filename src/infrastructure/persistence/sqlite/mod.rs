//! SQLite 持久化

pub mod database;
pub mod task_store;

pub use database::{create_pool, run_migrations, DatabaseConfig, DbPool};
pub use task_store::SqliteTaskStore;
