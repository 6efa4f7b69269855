//! HTTP Layer - worker 与 origin 的 RESTful API

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use routes::{origin_routes, worker_routes};
pub use server::{origin_app, worker_app, HttpServer, ServerConfig};
pub use state::{OriginState, WorkerState};
