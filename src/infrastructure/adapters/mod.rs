//! Infrastructure Adapters
//!
//! 六边形架构的适配器实现

pub mod clock;
pub mod relay;
pub mod reward;
pub mod sdapi;
pub mod storage;

pub use clock::*;
pub use relay::*;
pub use reward::*;
pub use sdapi::*;
pub use storage::*;
