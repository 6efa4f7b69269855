//! Fake Backend - 脚本化的生成后端
//!
//! 不发出任何网络请求，按路径返回预先设定的回复并记录每次调用。
//! 每个路由的回复按队列依次返回，最后一个回复会一直重复。

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::application::ports::{BackendError, BackendTransportPort};

/// 一次被记录的调用
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: &'static str,
    pub path: String,
    pub body: Option<Value>,
}

type Reply = Result<Value, BackendError>;

/// Fake Backend
#[derive(Default)]
pub struct FakeBackend {
    routes: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// 为 GET 路由追加一个回复
    pub fn on_get(&self, path: &str, reply: Reply) -> &Self {
        self.push("GET", path, reply)
    }

    /// 为 POST 路由追加一个回复
    pub fn on_post(&self, path: &str, reply: Reply) -> &Self {
        self.push("POST", path, reply)
    }

    /// 到目前为止的全部调用，按发生顺序
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// 指定路径被调用的次数
    pub fn call_count(&self, method: &str, path: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.method == method && call.path == path)
            .count()
    }

    fn push(&self, method: &str, path: &str, reply: Reply) -> &Self {
        self.routes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(route_key(method, path))
            .or_default()
            .push_back(reply);
        self
    }

    fn reply(&self, method: &'static str, path: &str, body: Option<&Value>) -> Reply {
        self.calls
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(RecordedCall {
                method,
                path: path.to_string(),
                body: body.cloned(),
            });

        let mut routes = self
            .routes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let queue = match routes.get_mut(&route_key(method, path)) {
            Some(queue) if !queue.is_empty() => queue,
            _ => {
                tracing::debug!(method, path, "FakeBackend: no scripted reply");
                return Err(BackendError::Status {
                    status: 404,
                    body: format!("no scripted reply for {} {}", method, path),
                });
            }
        };

        if queue.len() > 1 {
            queue.pop_front().unwrap_or_else(|| Ok(Value::Null))
        } else {
            queue.front().cloned().unwrap_or_else(|| Ok(Value::Null))
        }
    }
}

fn route_key(method: &str, path: &str) -> String {
    format!("{} {}", method, path)
}

#[async_trait]
impl BackendTransportPort for FakeBackend {
    async fn get(&self, path: &str) -> Result<Value, BackendError> {
        self.reply("GET", path, None)
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, BackendError> {
        self.reply("POST", path, Some(body))
    }
}
