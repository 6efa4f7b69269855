//! Events - 中继事件发布

mod publisher;

pub use publisher::EventPublisher;
