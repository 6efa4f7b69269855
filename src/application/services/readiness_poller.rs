//! Readiness Poller - 等待后端空闲
//!
//! 后端没有完成回调，只能轮询 `/sdapi/v1/progress`。
//! 每个周期先等待 `check_interval` 再查询；同一快照中
//! progress == 0.0 且 job_count == 0 时视为空闲。
//!
//! 失败策略: 连续失败达到 `max_consecutive_failures` 次后返回最后一次错误，
//! 任意一次成功的查询都会清零计数。

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::BackendCatalog;
use crate::application::error::ApplicationError;
use crate::application::ports::{ClockPort, RelayEvent, RelayEventSink};
use crate::domain::generation::ProgressState;

#[derive(Debug, Clone)]
pub struct ReadinessPollerConfig {
    /// 轮询间隔
    pub check_interval: Duration,
    /// 允许的连续查询失败次数
    pub max_consecutive_failures: u32,
    /// 查询进度时不返回当前预览图
    pub skip_current_image: bool,
}

impl Default for ReadinessPollerConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(5),
            max_consecutive_failures: 3,
            skip_current_image: true,
        }
    }
}

pub struct ReadinessPoller {
    catalog: Arc<BackendCatalog>,
    clock: Arc<dyn ClockPort>,
    events: Arc<dyn RelayEventSink>,
    config: ReadinessPollerConfig,
}

impl ReadinessPoller {
    pub fn new(
        catalog: Arc<BackendCatalog>,
        clock: Arc<dyn ClockPort>,
        events: Arc<dyn RelayEventSink>,
        config: ReadinessPollerConfig,
    ) -> Self {
        Self {
            catalog,
            clock,
            events,
            config,
        }
    }

    /// 阻塞直到后端空闲或被取消
    pub async fn wait_for_ready(
        &self,
        cancel: &CancellationToken,
    ) -> Result<ProgressState, ApplicationError> {
        let mut consecutive_failures = 0u32;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ApplicationError::Cancelled),
                _ = self.clock.sleep(self.config.check_interval) => {}
            }

            let polled = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ApplicationError::Cancelled),
                polled = self.catalog.get_progress(self.config.skip_current_image) => polled,
            };

            match polled {
                Ok(state) if state.is_idle() => {
                    self.events.publish(RelayEvent::BackendReady {
                        at: self.clock.now(),
                    });
                    tracing::info!("Backend ready");
                    return Ok(state);
                }
                Ok(state) => {
                    consecutive_failures = 0;
                    self.events.publish(RelayEvent::BackendBusy {
                        progress: state.progress,
                        job_count: state.job_count(),
                        at: self.clock.now(),
                    });
                    tracing::info!(
                        progress = state.progress,
                        job_count = state.job_count(),
                        "Waiting for backend"
                    );
                }
                Err(e) => {
                    consecutive_failures += 1;
                    tracing::warn!(
                        error = %e,
                        consecutive_failures,
                        max = self.config.max_consecutive_failures,
                        "Progress poll failed"
                    );
                    if consecutive_failures >= self.config.max_consecutive_failures {
                        return Err(e.into());
                    }
                }
            }
        }
    }
}
