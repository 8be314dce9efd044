//! 单账号会话
//!
//! 一个会话驱动一个钱包完成以下循环：
//!
//! ```text
//! (检查出口 IP)? -> 获取钱包详情 -> (每日领取)? -> (一次性任务)? -> loop {
//!     查询节点状态 -> (启动节点 -> 刷新积分)? -> 休眠 -> (停止节点 -> 短暂休眠)?
//! }
//! ```
//!
//! 同一会话内的请求严格串行；会话之间不共享可变状态

mod launcher;
mod tasks;

pub use launcher::EdgeLauncher;

use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::{random_secs, Clock};
use crate::edge::client::ApiError;
use crate::edge::model::requests::{SignedAction, SignedRequest};
use crate::edge::model::wallet::{ApiReply, NodeStatus, WalletDetails};
use crate::edge::provider::{EdgeApi, NodeAction};
use crate::edge::signer::SigningIdentity;

/// 每日领取成功的回复
pub const DAILY_CLAIM_OK: &str = "node points claimed successfully";

/// 节点启停成功的回复片段
pub const NODE_ACTION_OK: &str = "node action executed successfully";

/// 停止时节点本就未运行
pub const NO_NODE_RUNNING: &str = "no node running for given address";

/// 随机休眠区间（秒，闭区间）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SleepWindow {
    pub min_secs: u64,
    pub max_secs: u64,
}

impl SleepWindow {
    /// 长休眠：1-6 小时
    pub const LONG: Self = Self::new(3600, 21600);
    /// 短休眠：1-2 分钟
    pub const SHORT: Self = Self::new(60, 120);
    /// 停止节点后重启前的等待
    pub const AFTER_STOP: Self = Self::new(11, 18);
    /// 不停止节点时两轮之间的间隔
    pub const BETWEEN_CYCLES: Self = Self::new(1, 2);

    pub const fn new(min_secs: u64, max_secs: u64) -> Self {
        Self { min_secs, max_secs }
    }

    pub fn sample(&self) -> Duration {
        random_secs(self.min_secs, self.max_secs)
    }

    #[cfg(test)]
    pub fn contains(&self, duration: Duration) -> bool {
        let secs = duration.as_secs();
        secs >= self.min_secs && secs <= self.max_secs
    }
}

/// 会话配置，构造后不可变
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub do_proof: bool,
    pub do_twitter: bool,
    /// 每轮休眠后停止节点
    pub stop_node: bool,
    pub sleep_window: SleepWindow,
    pub stop_attempts: u32,
    pub stop_backoff: Duration,
    pub status_attempts: u32,
    pub status_backoff: Duration,
    pub task_attempts: u32,
    pub task_backoff: Duration,
    /// 达到轮数后会话正常结束；None 表示一直运行
    pub max_cycles: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            do_proof: false,
            do_twitter: false,
            stop_node: false,
            sleep_window: SleepWindow::LONG,
            stop_attempts: 50,
            stop_backoff: Duration::from_secs(2),
            status_attempts: 6,
            status_backoff: Duration::from_secs(2),
            task_attempts: 5,
            task_backoff: Duration::from_secs(1),
            max_cycles: None,
        }
    }
}

/// 会话致命错误，交由调度器决定是否重试
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("出口 IP 检查失败: {0}")]
    EgressIp(#[source] ApiError),
    #[error("获取钱包详情失败: {0}")]
    WalletDetails(#[source] ApiError),
    #[error("获取节点状态失败，已尝试 {attempts} 次")]
    NodeStatus { attempts: u32 },
    #[error("启动节点失败: {0}")]
    NodeStart(String),
    #[error("签名失败: {0}")]
    Signing(String),
}

/// 单账号会话
pub struct AccountSession {
    identity: Arc<SigningIdentity>,
    api: EdgeApi,
    clock: Arc<dyn Clock>,
    config: SessionConfig,
}

impl AccountSession {
    pub fn new(
        identity: Arc<SigningIdentity>,
        api: EdgeApi,
        clock: Arc<dyn Clock>,
        config: SessionConfig,
    ) -> Self {
        Self {
            identity,
            api,
            clock,
            config,
        }
    }

    pub fn address(&self) -> &str {
        self.identity.address()
    }

    fn today(&self) -> NaiveDate {
        self.clock.now().date_naive()
    }

    /// 用当前时间戳重新签名
    fn sign(&self, action: SignedAction) -> Result<SignedRequest, SessionError> {
        SignedRequest::new(&self.identity, action, self.clock.timestamp_millis())
            .map_err(|e| SessionError::Signing(e.to_string()))
    }

    /// 运行会话直至致命错误或达到轮数上限
    pub async fn run(&self) -> Result<(), SessionError> {
        if let Some(ip) = self.api.egress_ip().await.map_err(SessionError::EgressIp)? {
            tracing::info!("出口 IP: {}", ip);
        }
        tracing::info!("钱包地址: {}", self.address());

        let details = self.fetch_details().await.map_err(SessionError::WalletDetails)?;
        let mut checked_on = self.today();
        self.claim_daily_if_due(&details).await;

        if self.config.do_proof {
            self.submit_proof().await;
        }
        if self.config.do_twitter {
            self.link_twitter().await;
        }

        let mut cycles: u64 = 0;
        loop {
            // 跨天后重新检查每日领取
            let today = self.today();
            if today != checked_on {
                checked_on = today;
                match self.fetch_details().await {
                    Ok(details) => {
                        self.claim_daily_if_due(&details).await;
                    }
                    Err(e) => tracing::warn!("刷新钱包详情失败: {}", e),
                }
            }

            let status = self.poll_status().await?;
            if status.is_running() {
                tracing::info!("节点已在运行");
            } else {
                self.start_node().await?;
                self.refresh_points().await;
            }

            let nap = self.config.sleep_window.sample();
            tracing::info!("休眠 {} 秒", nap.as_secs());
            self.clock.sleep(nap).await;

            if self.config.stop_node {
                self.stop_node().await;
                let pause = SleepWindow::AFTER_STOP.sample();
                tracing::info!("{} 秒后重启节点", pause.as_secs());
                self.clock.sleep(pause).await;
            } else {
                self.clock.sleep(SleepWindow::BETWEEN_CYCLES.sample()).await;
            }

            cycles += 1;
            if self.config.max_cycles.is_some_and(|max| cycles >= max) {
                tracing::info!("已完成 {} 轮，会话结束", cycles);
                return Ok(());
            }
        }
    }

    async fn fetch_details(&self) -> Result<WalletDetails, ApiError> {
        let details = self.api.wallet_details(self.address()).await?;
        tracing::info!(
            "邀请码: {}",
            details.referral_code.as_deref().unwrap_or("-")
        );
        tracing::info!("节点积分: {}", details.points_display());
        Ok(details)
    }

    /// 启动后刷新积分；失败只记录警告
    async fn refresh_points(&self) {
        match self.api.wallet_details(self.address()).await {
            Ok(details) if details.node_points.is_some() => {
                tracing::info!("更新后节点积分: {}", details.points_display());
            }
            Ok(_) => tracing::warn!("钱包详情中没有节点积分"),
            Err(e) => tracing::warn!("启动后获取钱包详情失败: {}", e),
        }
    }

    /// 今日未领取时领取每日积分；失败不影响后续流程
    ///
    /// 返回是否确认领取成功
    async fn claim_daily_if_due(&self, details: &WalletDetails) -> bool {
        let today = self.today();
        if !details.claim_window().is_due(today) {
            tracing::info!("今日积分已领取");
            return false;
        }

        let request = match self.sign(SignedAction::DailyClaim) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!("每日领取失败: {}", e);
                return false;
            }
        };

        match self.api.claim_daily(&request.claim_body()).await {
            Ok(reply) if reply.message_is(DAILY_CLAIM_OK) => {
                tracing::info!("每日积分领取成功");
                true
            }
            Ok(reply) => {
                tracing::warn!("每日积分领取失败: {}", reply.message());
                false
            }
            Err(e) => {
                tracing::warn!("每日积分领取失败: {}", e);
                false
            }
        }
    }

    /// 查询节点状态，有限次重试
    async fn poll_status(&self) -> Result<NodeStatus, SessionError> {
        let max = self.config.status_attempts;
        for attempt in 1..=max {
            match self.api.node_status(self.address()).await {
                Ok(status) => return Ok(status),
                Err(e) => {
                    tracing::warn!("获取节点状态失败 ({}/{}): {}", attempt, max, e);
                    if attempt < max {
                        self.clock.sleep(self.config.status_backoff).await;
                    }
                }
            }
        }
        Err(SessionError::NodeStatus { attempts: max })
    }

    /// 启动节点；任何非成功回复都是致命错误
    async fn start_node(&self) -> Result<(), SessionError> {
        let request = self.sign(SignedAction::NodeStart)?;
        let reply = self
            .api
            .node_action(self.address(), NodeAction::Start, &request.node_action_body())
            .await
            .map_err(|e| SessionError::NodeStart(e.to_string()))?;

        if reply.message_contains(NODE_ACTION_OK) {
            tracing::info!("节点启动成功");
            Ok(())
        } else {
            Err(SessionError::NodeStart(format!(
                "意外回复: {}",
                reply.message()
            )))
        }
    }

    /// 停止节点，每次尝试重新签名；用尽次数只记录警告
    ///
    /// 返回是否确认已停止
    async fn stop_node(&self) -> bool {
        tracing::info!("正在停止节点...");
        let max = self.config.stop_attempts;
        for attempt in 1..=max {
            let request = match self.sign(SignedAction::NodeStop) {
                Ok(request) => request,
                Err(e) => {
                    tracing::warn!("停止节点失败: {}", e);
                    return false;
                }
            };

            let result = self
                .api
                .node_action(self.address(), NodeAction::Stop, &request.node_action_body())
                .await;
            let reply = match &result {
                Ok(reply) => Some(reply.clone()),
                Err(e) => ApiReply::from_error(e),
            };

            match reply {
                Some(reply) if reply.message_contains(NODE_ACTION_OK) => {
                    tracing::info!("节点已停止");
                    return true;
                }
                Some(reply) if reply.message_is(NO_NODE_RUNNING) => {
                    tracing::info!("节点未在运行，无需停止");
                    return true;
                }
                Some(reply) => {
                    tracing::warn!("停止节点失败 ({}/{}): {}", attempt, max, reply.message())
                }
                None => {
                    let reason = result.err().map(|e| e.to_string()).unwrap_or_default();
                    tracing::warn!("停止节点失败 ({}/{}): {}", attempt, max, reason)
                }
            }

            if attempt < max {
                self.clock.sleep(self.config.stop_backoff).await;
            }
        }

        tracing::warn!("停止节点失败，已达最大重试次数 {}", max);
        false
    }
}
