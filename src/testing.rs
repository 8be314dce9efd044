//! 测试辅助：脚本化传输层与手动时钟

use async_trait::async_trait;
use chrono::{DateTime, Local, TimeZone};
use http::Method;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use crate::clock::Clock;
use crate::edge::transport::{RawResponse, Transport, TransportError};

/// 记录下来的一次请求
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: Method,
    pub url: String,
    pub body: Option<Value>,
}

impl RecordedCall {
    /// `"GET /path"` 形式的简写，便于断言调用顺序
    pub fn summary(&self) -> String {
        let path = self
            .url
            .split_once("://")
            .and_then(|(_, rest)| rest.find('/').map(|i| &rest[i..]))
            .unwrap_or(&self.url);
        format!("{} {}", self.method, path)
    }
}

/// 按顺序回放预设响应的传输层
///
/// 脚本耗尽后返回 404，保证被测循环能够结束
#[derive(Default)]
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<RawResponse, TransportError>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, response: RawResponse) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    pub fn push_json(&self, status: u16, body: Value) {
        self.push(RawResponse::json(status, body));
    }

    pub fn push_network_error(&self, reason: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(TransportError::Network(reason.to_string())));
    }

    pub fn push_request_error(&self, reason: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(TransportError::Request(reason.to_string())));
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn summaries(&self) -> Vec<String> {
        self.calls().iter().map(RecordedCall::summary).collect()
    }

    pub fn count_matching(&self, needle: &str) -> usize {
        self.calls().iter().filter(|c| c.url.contains(needle)).count()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<RawResponse, TransportError> {
        self.calls.lock().unwrap().push(RecordedCall {
            method,
            url: url.to_string(),
            body: body.cloned(),
        });
        let next = self.responses.lock().unwrap().pop_front();
        tokio::task::yield_now().await;
        next.unwrap_or_else(|| Ok(RawResponse::json(404, json!({"message": "script exhausted"}))))
    }
}

/// 手动时钟：sleep 立即返回，记录时长并推进当前时间
pub struct ManualClock {
    now: Mutex<DateTime<Local>>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn at(now: DateTime<Local>) -> Self {
        Self {
            now: Mutex::new(now),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::at(fixed_now())
    }
}

/// 测试用的固定时间：2025-01-15 12:00 本地时间
pub fn fixed_now() -> DateTime<Local> {
    Local.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).earliest().unwrap()
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        *self.now.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
        {
            let mut now = self.now.lock().unwrap();
            *now += chrono::Duration::from_std(duration).unwrap();
        }
        tokio::task::yield_now().await;
    }
}
