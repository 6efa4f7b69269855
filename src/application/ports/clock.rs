//! Clock Port - 可注入的时钟
//!
//! 轮询与租约依赖时间，测试中替换为手动时钟

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait ClockPort: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    async fn sleep(&self, duration: Duration);
}
