//! HTTP Handlers

mod ping;
mod relay;
mod task;

pub use ping::*;
pub use relay::*;
pub use task::*;
