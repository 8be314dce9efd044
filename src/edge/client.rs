//! 带重试的 HTTP 请求封装
//!
//! 把每次响应归为三类：
//! - 成功：状态码 < 400，按 Content-Type 解析为 JSON 或文本
//! - 可重试：网络故障、500/502/504、网关错误页面，固定间隔无限重试
//! - 终止：其余 >= 400 的状态码，只请求一次，交由调用方决定

use http::Method;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::edge::transport::{RawResponse, Transport, TransportError};

/// 视为临时故障的状态码
const RETRYABLE_STATUS: [u16; 3] = [500, 502, 504];

/// 网关错误页面标记
const GATEWAY_MARKERS: [&str; 2] = [
    "<title>502 Bad Gateway</title>",
    "<title>504 Gateway Time-out</title>",
];

/// 成功响应的内容
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Text(String),
}

impl Payload {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Payload::Json(v) => Some(v),
            Payload::Text(_) => None,
        }
    }

    pub fn into_json(self) -> Option<Value> {
        match self {
            Payload::Json(v) => Some(v),
            Payload::Text(_) => None,
        }
    }
}

/// 单次响应的分类结果
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(Payload),
    RetryableFault(String),
    TerminalFault {
        status: u16,
        message: String,
        payload: Option<Value>,
    },
}

/// 请求失败
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// 服务端拒绝（>= 400 且不可重试）
    #[error("HTTP {status}: {message}")]
    Rejected {
        status: u16,
        message: String,
        /// 错误响应体为 JSON 时保留原文
        payload: Option<Value>,
    },
    /// 请求无法发出
    #[error("请求无效: {0}")]
    Invalid(String),
    /// 响应格式与预期不符
    #[error("响应格式异常: {0}")]
    Unexpected(String),
}

impl ApiError {
    /// 服务端返回的状态码
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// 错误响应中的 JSON
    pub fn payload(&self) -> Option<&Value> {
        match self {
            ApiError::Rejected { payload, .. } => payload.as_ref(),
            _ => None,
        }
    }
}

/// 对原始响应做分类
pub fn classify(raw: RawResponse) -> Outcome {
    if RETRYABLE_STATUS.contains(&raw.status) {
        return Outcome::RetryableFault(format!("HTTP {}", raw.status));
    }

    if raw.status >= 400 {
        let payload = serde_json::from_str::<Value>(&raw.body).ok();
        let message = payload
            .as_ref()
            .and_then(|v| v.get("message"))
            .and_then(|m| m.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| summarize(&raw.body));
        return Outcome::TerminalFault {
            status: raw.status,
            message,
            payload,
        };
    }

    if GATEWAY_MARKERS.iter().any(|m| raw.body.contains(m)) {
        return Outcome::RetryableFault("响应内容为网关错误页面".to_string());
    }

    if raw.content_type.contains("application/json") {
        match serde_json::from_str::<Value>(&raw.body) {
            Ok(v) => Outcome::Success(Payload::Json(v)),
            Err(_) => Outcome::Success(Payload::Text(raw.body)),
        }
    } else {
        Outcome::Success(Payload::Text(raw.body))
    }
}

fn summarize(body: &str) -> String {
    const LIMIT: usize = 200;
    if body.chars().count() <= LIMIT {
        body.to_string()
    } else {
        let head: String = body.chars().take(LIMIT).collect();
        format!("{}...", head)
    }
}

/// 带重试的请求客户端
#[derive(Clone)]
pub struct ResilientClient {
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    backoff: Duration,
}

impl ResilientClient {
    pub fn new(transport: Arc<dyn Transport>, clock: Arc<dyn Clock>, backoff: Duration) -> Self {
        Self {
            transport,
            clock,
            backoff,
        }
    }

    pub async fn get(&self, url: &str) -> Result<Payload, ApiError> {
        self.request(Method::GET, url, None).await
    }

    pub async fn post<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> Result<Payload, ApiError> {
        let body = serde_json::to_value(body).map_err(|e| ApiError::Invalid(e.to_string()))?;
        self.request(Method::POST, url, Some(body)).await
    }

    /// 发送请求
    ///
    /// 临时故障在此处无限重试，不会向上返回
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<Value>,
    ) -> Result<Payload, ApiError> {
        loop {
            let reason = match self.transport.send(method.clone(), url, body.as_ref()).await {
                Err(TransportError::Request(e)) => return Err(ApiError::Invalid(e)),
                Err(TransportError::Network(e)) => e,
                Ok(raw) => match classify(raw) {
                    Outcome::Success(payload) => return Ok(payload),
                    Outcome::RetryableFault(reason) => reason,
                    Outcome::TerminalFault {
                        status,
                        message,
                        payload,
                    } => {
                        tracing::warn!("{} {} 失败: HTTP {}: {}", method, url, status, message);
                        return Err(ApiError::Rejected {
                            status,
                            message,
                            payload,
                        });
                    }
                },
            };

            tracing::warn!(
                "{} {} 临时故障: {}，{}s 后重试",
                method,
                url,
                reason,
                self.backoff.as_secs()
            );
            self.clock.sleep(self.backoff).await;
        }
    }
}
