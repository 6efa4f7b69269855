//! Clock Adapter - 时钟实现

mod system_clock;

pub use system_clock::SystemClock;
