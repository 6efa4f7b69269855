//! Persistence Layer - 持久化

pub mod sqlite;

pub use self::sqlite::SqliteTaskStore;
