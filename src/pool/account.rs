//! 账号状态管理

use std::sync::Arc;

use crate::edge::signer::SigningIdentity;
use crate::http_client::ProxyConfig;

/// 账号信息
#[derive(Debug, Clone)]
pub struct Account {
    /// 在私钥文件中的序号
    pub index: usize,
    pub identity: Arc<SigningIdentity>,
    /// 当前使用的代理
    pub proxy: Option<ProxyConfig>,
    /// 会话尝试次数
    pub attempts: u32,
    /// 最近一次失败原因
    pub last_error: Option<String>,
}

impl Account {
    /// 创建新账号
    pub fn new(index: usize, identity: Arc<SigningIdentity>, proxy: Option<ProxyConfig>) -> Self {
        Self {
            index,
            identity,
            proxy,
            attempts: 0,
            last_error: None,
        }
    }

    pub fn address(&self) -> &str {
        self.identity.address()
    }

    /// 记录一次会话启动
    pub fn record_attempt(&mut self) {
        self.attempts += 1;
    }

    /// 记录失败；返回是否还能重试
    pub fn record_failure(&mut self, error: impl Into<String>, max_attempts: u32) -> bool {
        self.last_error = Some(error.into());
        self.attempts < max_attempts
    }

    /// 更换代理
    pub fn switch_proxy(&mut self, proxy: Option<ProxyConfig>) {
        self.proxy = proxy;
    }
}
