//! 底层 HTTP 传输
//!
//! [`Transport`] 只负责一次原始的 HTTP 往返，不做任何重试或结果判定；
//! 生产环境使用基于 reqwest 的 [`ReqwestTransport`]

use async_trait::async_trait;
use http::Method;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde_json::Value;

use crate::http_client::{build_client, dashboard_headers, random_user_agent, ProxyConfig};

/// 原始响应
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub content_type: String,
    pub body: String,
}

#[cfg(test)]
impl RawResponse {
    /// JSON 响应
    pub fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            content_type: "application/json; charset=utf-8".to_string(),
            body: body.to_string(),
        }
    }

    /// 纯文本/HTML 响应
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: "text/html".to_string(),
            body: body.into(),
        }
    }
}

/// 传输层错误
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// 超时、连接重置、代理不可用等网络故障，可重试
    #[error("网络错误: {0}")]
    Network(String),
    /// 请求本身无法构建（URL 非法等），重试也不会成功
    #[error("请求构建失败: {0}")]
    Request(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_builder() {
            TransportError::Request(e.to_string())
        } else {
            TransportError::Network(e.to_string())
        }
    }
}

/// 一次 HTTP 往返
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<RawResponse, TransportError>;
}

/// 基于 reqwest 的传输实现
///
/// 每个账号会话独占一个实例（独立连接池、UA 与代理）
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// 创建传输实例
    ///
    /// # Arguments
    /// * `proxy` - 该账号绑定的代理
    /// * `timeout_secs` - 单次请求超时（秒）
    /// * `origin` - 面板站点地址，用作 Origin/Referer
    pub fn new(proxy: Option<&ProxyConfig>, timeout_secs: u64, origin: &str) -> anyhow::Result<Self> {
        let headers = dashboard_headers(origin, random_user_agent())?;
        let client = build_client(proxy, timeout_secs, headers)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<RawResponse, TransportError> {
        let mut request = self.client.request(method, url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response.text().await?;

        Ok(RawResponse {
            status,
            content_type,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_raw_response_helpers() {
        let raw = RawResponse::json(200, json!({"message": "ok"}));
        assert_eq!(raw.status, 200);
        assert!(raw.content_type.contains("application/json"));
        assert_eq!(raw.body, r#"{"message":"ok"}"#);

        let raw = RawResponse::text(502, "<html></html>");
        assert_eq!(raw.content_type, "text/html");
    }

    #[test]
    fn test_reqwest_transport_builds() {
        assert!(ReqwestTransport::new(None, 10, "https://dashboard.layeredge.io").is_ok());
        let proxy = ProxyConfig::new("socks5://127.0.0.1:1080");
        assert!(ReqwestTransport::new(Some(&proxy), 10, "https://dashboard.layeredge.io").is_ok());
    }

    #[tokio::test]
    async fn test_invalid_url_is_request_error() {
        let transport = ReqwestTransport::new(None, 1, "https://dashboard.layeredge.io").unwrap();
        let err = transport
            .send(Method::GET, "not a url", None)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Request(_)));
    }
}
