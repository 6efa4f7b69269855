//! Event Publisher Implementation
//!
//! 基于 broadcast 通道的中继事件推送

use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{RelayEvent, RelayEventSink};

/// 事件发布器
pub struct EventPublisher {
    channel: broadcast::Sender<RelayEvent>,
}

impl EventPublisher {
    pub fn new() -> Self {
        Self::with_capacity(100)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { channel: tx }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// 订阅全部中继事件
    pub fn subscribe(&self) -> broadcast::Receiver<RelayEvent> {
        self.channel.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.channel.receiver_count()
    }

    /// 订阅全部事件并写入日志，直到取消
    ///
    /// 订阅在返回前完成，之后发布的事件都不会丢失。
    /// 取消时先处理完已排队的事件，返回值为转发的事件数。
    pub fn spawn_log_forwarder(&self, cancel: CancellationToken) -> JoinHandle<u64> {
        let mut rx = self.subscribe();
        tokio::spawn(async move {
            let mut forwarded = 0u64;
            loop {
                tokio::select! {
                    biased;
                    received = rx.recv() => match received {
                        Ok(event) => {
                            forwarded += 1;
                            log_event(&event);
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "Relay event log lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    _ = cancel.cancelled() => break,
                }
            }
            forwarded
        })
    }
}

fn log_event(event: &RelayEvent) {
    match event {
        RelayEvent::BackendBusy { progress, job_count, at } => {
            tracing::debug!(progress, job_count, %at, "event: backend busy");
        }
        RelayEvent::BackendReady { at } => {
            tracing::debug!(%at, "event: backend ready");
        }
        RelayEvent::TaskDispatched { task_id } => {
            tracing::info!(task_id = %task_id, "event: task dispatched");
        }
        RelayEvent::TaskCompleted { task_id, result_ref } => {
            tracing::info!(task_id = %task_id, result_ref = %result_ref, "event: task completed");
        }
        RelayEvent::TaskFailed { task_id, error } => {
            tracing::warn!(task_id = %task_id, error = %error, "event: task failed");
        }
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayEventSink for EventPublisher {
    fn publish(&self, event: RelayEvent) {
        if let Err(e) = self.channel.send(event) {
            tracing::debug!(
                event = ?e.0,
                "Failed to publish relay event (no receivers)"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::task::TaskId;

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let publisher = EventPublisher::new();
        let mut rx = publisher.subscribe();
        let task_id = TaskId::new();

        publisher.publish(RelayEvent::TaskDispatched {
            task_id: task_id.to_string(),
        });

        match rx.recv().await.unwrap() {
            RelayEvent::TaskDispatched { task_id: id } => assert_eq!(id, task_id.to_string()),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_log_forwarder_drains_queued_events() {
        let publisher = EventPublisher::new();
        let cancel = CancellationToken::new();
        let handle = publisher.spawn_log_forwarder(cancel.clone());
        assert_eq!(publisher.receiver_count(), 1);

        publisher.publish(RelayEvent::TaskDispatched {
            task_id: "t1".to_string(),
        });
        publisher.publish(RelayEvent::TaskCompleted {
            task_id: "t1".to_string(),
            result_ref: "images/t1.png".to_string(),
        });
        publisher.publish(RelayEvent::TaskFailed {
            task_id: "t2".to_string(),
            error: "boom".to_string(),
        });
        cancel.cancel();

        assert_eq!(handle.await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_log_forwarder_stops_when_publisher_dropped() {
        let publisher = EventPublisher::new();
        let handle = publisher.spawn_log_forwarder(CancellationToken::new());
        publisher.publish(RelayEvent::TaskDispatched {
            task_id: "t1".to_string(),
        });
        drop(publisher);

        assert_eq!(handle.await.unwrap(), 1);
    }

    #[test]
    fn test_publish_without_receivers_is_silent() {
        let publisher = EventPublisher::new();
        assert_eq!(publisher.receiver_count(), 0);
        publisher.publish(RelayEvent::TaskFailed {
            task_id: "t".to_string(),
            error: "boom".to_string(),
        });
    }
}
