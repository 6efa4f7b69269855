//! Stable Diffusion Adapter - 生成后端传输实现

mod fake_backend;
mod http_backend_client;

pub use fake_backend::{FakeBackend, RecordedCall};
pub use http_backend_client::*;
