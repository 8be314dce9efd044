//! 代理选择策略

use serde::{Deserialize, Serialize};

use crate::http_client::ProxyConfig;

/// 选择策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionStrategy {
    /// 按账号序号轮询
    #[default]
    RoundRobin,
    /// 随机
    Random,
}

impl SelectionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RoundRobin => "round-robin",
            Self::Random => "random",
        }
    }

    /// 为第 `index` 个账号挑选代理；代理池为空时直连
    pub fn pick(&self, index: usize, proxies: &[ProxyConfig]) -> Option<ProxyConfig> {
        if proxies.is_empty() {
            return None;
        }
        let i = match self {
            Self::RoundRobin => index % proxies.len(),
            Self::Random => fastrand::usize(..proxies.len()),
        };
        proxies.get(i).cloned()
    }
}
