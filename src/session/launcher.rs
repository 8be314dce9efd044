//! 为调度器构建账号会话

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use super::{AccountSession, SessionConfig};
use crate::clock::Clock;
use crate::edge::client::ResilientClient;
use crate::edge::provider::{EdgeApi, Endpoints};
use crate::edge::signer::SigningIdentity;
use crate::edge::transport::ReqwestTransport;
use crate::http_client::ProxyConfig;
use crate::model::config::Config;
use crate::pool::SessionLauncher;

/// 每次尝试都新建 HTTP 客户端（新的 User-Agent 与代理）
pub struct EdgeLauncher {
    session_config: SessionConfig,
    endpoints: Endpoints,
    clock: Arc<dyn Clock>,
    timeout_secs: u64,
    backoff: Duration,
}

impl EdgeLauncher {
    pub fn from_config(config: &Config, clock: Arc<dyn Clock>) -> Self {
        Self {
            session_config: config.session_config(),
            endpoints: config.endpoints(),
            clock,
            timeout_secs: config.request_timeout_secs,
            backoff: config.retry_backoff(),
        }
    }
}

#[async_trait]
impl SessionLauncher for EdgeLauncher {
    async fn launch(
        &self,
        identity: Arc<SigningIdentity>,
        proxy: Option<ProxyConfig>,
    ) -> anyhow::Result<()> {
        if let Some(proxy) = &proxy {
            tracing::info!("使用代理: {}", proxy.redacted());
        }
        let transport = ReqwestTransport::new(
            proxy.as_ref(),
            self.timeout_secs,
            self.endpoints.dashboard_base(),
        )?;
        let client = ResilientClient::new(Arc::new(transport), self.clock.clone(), self.backoff);
        let api = EdgeApi::new(client, self.endpoints.clone());
        let session = AccountSession::new(identity, api, self.clock.clone(), self.session_config.clone());
        session.run().await?;
        Ok(())
    }
}
