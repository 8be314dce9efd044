//! 用邀请码注册待注册钱包
//!
//! 注册成功的私钥从待注册文件移入正式私钥文件

use futures::future::join_all;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::edge::provider::EdgeApi;
use crate::edge::signer::SigningIdentity;
use crate::keystore;

/// 单个钱包的注册结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Registered,
    /// 409：钱包已注册，私钥保留在待注册文件中
    AlreadyRegistered,
    Failed,
}

/// 注册汇总
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RegisterSummary {
    pub registered: usize,
    pub already_registered: usize,
    pub failed: usize,
    pub invalid: usize,
}

pub struct Registrar {
    api: EdgeApi,
    clock: Arc<dyn Clock>,
    attempts: u32,
    retry_delay: Duration,
}

impl Registrar {
    pub fn new(api: EdgeApi, clock: Arc<dyn Clock>, attempts: u32) -> Self {
        Self {
            api,
            clock,
            attempts: attempts.max(1),
            retry_delay: Duration::from_secs(2),
        }
    }

    /// 注册单个钱包，有限次重试
    pub async fn register(&self, referral_code: &str, address: &str) -> Registration {
        for attempt in 1..=self.attempts {
            match self.api.register_wallet(referral_code, address).await {
                Ok(reply) => {
                    tracing::info!("钱包注册成功: {} - {}", address, reply.message());
                    return Registration::Registered;
                }
                Err(e) if e.status() == Some(409) => {
                    tracing::info!("钱包已注册: {} - {}", address, e);
                    return Registration::AlreadyRegistered;
                }
                Err(e) => {
                    tracing::warn!(
                        "钱包注册失败 ({}/{}): {} - {}",
                        attempt,
                        self.attempts,
                        address,
                        e
                    );
                }
            }
            self.clock.sleep(self.retry_delay).await;
        }
        tracing::error!("钱包注册失败，已达最大重试次数: {}", address);
        Registration::Failed
    }

    /// 并发注册待注册文件中的全部钱包，成功的私钥移入正式文件
    pub async fn register_pending(
        &self,
        referral_code: &str,
        pending_path: &Path,
        active_path: &Path,
    ) -> anyhow::Result<RegisterSummary> {
        let mut summary = RegisterSummary::default();
        let mut wallets = Vec::new();
        for key in keystore::read_lines(pending_path)? {
            match SigningIdentity::from_hex(&key) {
                Ok(identity) => wallets.push((key, identity)),
                Err(e) => {
                    tracing::warn!("跳过无效私钥: {}", e);
                    summary.invalid += 1;
                }
            }
        }

        if wallets.is_empty() {
            tracing::info!("没有待注册的钱包");
            return Ok(summary);
        }
        tracing::info!("开始注册 {} 个钱包", wallets.len());

        let results = join_all(
            wallets
                .iter()
                .map(|(_, identity)| self.register(referral_code, identity.address())),
        )
        .await;

        // 文件改写串行进行
        for ((key, _), result) in wallets.iter().zip(results) {
            match result {
                Registration::Registered => {
                    keystore::move_key(key, pending_path, active_path)?;
                    summary.registered += 1;
                }
                Registration::AlreadyRegistered => summary.already_registered += 1,
                Registration::Failed => summary.failed += 1,
            }
        }
        Ok(summary)
    }
}
