//! HTTP Client 构建模块
//!
//! 提供统一的 HTTP Client 构建功能，支持代理配置与固定请求头

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONNECTION, CONTENT_TYPE, ORIGIN, REFERER, USER_AGENT};
use reqwest::{Client, Proxy};
use std::time::Duration;

/// 常见桌面浏览器 UA，每个账号会话随机取一个
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36 Edg/132.0.0.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.6 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
];

/// 代理配置
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyConfig {
    /// 代理地址，支持 http/https/socks5
    pub url: String,
    /// 代理认证用户名
    pub username: Option<String>,
    /// 代理认证密码
    pub password: Option<String>,
}

impl ProxyConfig {
    /// 从 url 创建代理配置
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            username: None,
            password: None,
        }
    }

    /// 设置认证信息
    pub fn with_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// 日志用的代理地址，去掉其中的认证信息
    pub fn redacted(&self) -> String {
        let Ok(url) = reqwest::Url::parse(&self.url) else {
            return "<无效代理>".to_string();
        };
        match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{}://{}:{}", url.scheme(), host, port),
            (Some(host), None) => format!("{}://{}", url.scheme(), host),
            _ => "<无效代理>".to_string(),
        }
    }

    /// 解析代理列表中的一行
    ///
    /// 支持 `scheme://[user:pass@]host:port`，以及无 scheme 的
    /// `host:port` / `host:port:user:pass`（默认按 http 处理）
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        if line.contains("://") {
            return Some(Self::new(line));
        }

        let parts: Vec<&str> = line.split(':').collect();
        match parts.as_slice() {
            [host, port] => Some(Self::new(format!("http://{}:{}", host, port))),
            [host, port, user, pass] => {
                Some(Self::new(format!("http://{}:{}", host, port)).with_auth(*user, *pass))
            }
            _ => None,
        }
    }
}

/// 随机选取一个浏览器 UA
pub fn random_user_agent() -> &'static str {
    USER_AGENTS[fastrand::usize(..USER_AGENTS.len())]
}

/// 构建访问面板 API 的固定请求头
///
/// 请求头在构建 Client 时一次性确定，之后不再修改
pub fn dashboard_headers(origin: &str, user_agent: &str) -> anyhow::Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/json, text/plain, */*"),
    );
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(ORIGIN, HeaderValue::from_str(origin)?);
    headers.insert(
        REFERER,
        HeaderValue::from_str(&format!("{}/", origin.trim_end_matches('/')))?,
    );
    headers.insert(USER_AGENT, HeaderValue::from_str(user_agent)?);
    Ok(headers)
}

/// 构建 HTTP Client
///
/// # Arguments
/// * `proxy` - 可选的代理配置
/// * `timeout_secs` - 超时时间（秒）
/// * `headers` - 每个请求都携带的默认请求头
///
/// # Returns
/// 配置好的 reqwest::Client
pub fn build_client(
    proxy: Option<&ProxyConfig>,
    timeout_secs: u64,
    headers: HeaderMap,
) -> anyhow::Result<Client> {
    let mut builder = Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .default_headers(headers);

    if let Some(proxy_config) = proxy {
        let mut proxy = Proxy::all(&proxy_config.url)?;

        // 设置代理认证
        if let (Some(username), Some(password)) = (&proxy_config.username, &proxy_config.password) {
            proxy = proxy.basic_auth(username, password);
        }

        builder = builder.proxy(proxy);
        tracing::debug!("HTTP Client 使用代理: {}", proxy_config.redacted());
    }

    Ok(builder.build()?)
}
