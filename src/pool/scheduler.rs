//! 多账号调度
//!
//! 每个账号一个 tokio 任务，互不共享可变状态；
//! 会话失败时更换代理重试，超过上限后放弃该账号

use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::Instrument;

use super::{Account, SelectionStrategy};
use crate::edge::signer::SigningIdentity;
use crate::http_client::ProxyConfig;

/// 运行一次账号会话
#[async_trait]
pub trait SessionLauncher: Send + Sync + 'static {
    async fn launch(
        &self,
        identity: Arc<SigningIdentity>,
        proxy: Option<ProxyConfig>,
    ) -> anyhow::Result<()>;
}

/// 账号最终结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountOutcome {
    Completed { attempts: u32 },
    Abandoned { attempts: u32, last_error: Option<String> },
    /// 私钥无法解析，未启动会话
    InvalidKey(String),
}

/// 单个账号的运行报告
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountReport {
    pub index: usize,
    pub address: Option<String>,
    pub outcome: AccountOutcome,
}

impl AccountReport {
    pub fn is_completed(&self) -> bool {
        matches!(self.outcome, AccountOutcome::Completed { .. })
    }
}

/// 账号调度器
pub struct AccountScheduler<L> {
    launcher: Arc<L>,
    max_retries: u32,
    retry_strategy: SelectionStrategy,
}

impl<L: SessionLauncher> AccountScheduler<L> {
    pub fn new(launcher: L, max_retries: u32, retry_strategy: SelectionStrategy) -> Self {
        Self {
            launcher: Arc::new(launcher),
            max_retries: max_retries.max(1),
            retry_strategy,
        }
    }

    /// 并发运行所有账号，全部结束后按序号返回报告
    pub async fn run(&self, keys: Vec<String>, proxies: Vec<ProxyConfig>) -> Vec<AccountReport> {
        let proxies: Arc<[ProxyConfig]> = proxies.into();
        let mut reports = Vec::with_capacity(keys.len());
        let mut tasks = JoinSet::new();

        for (index, key) in keys.iter().enumerate() {
            let identity = match SigningIdentity::from_hex(key) {
                Ok(identity) => Arc::new(identity),
                Err(e) => {
                    tracing::error!("第 {} 个私钥无效，已跳过: {}", index + 1, e);
                    reports.push(AccountReport {
                        index,
                        address: None,
                        outcome: AccountOutcome::InvalidKey(e.to_string()),
                    });
                    continue;
                }
            };

            let proxy = SelectionStrategy::RoundRobin.pick(index, &proxies);
            let account = Account::new(index, identity, proxy);
            let span = tracing::info_span!("account", index, address = %account.address());

            tasks.spawn(
                drive_account(
                    self.launcher.clone(),
                    account,
                    proxies.clone(),
                    self.max_retries,
                    self.retry_strategy,
                )
                .instrument(span),
            );
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(report) => reports.push(report),
                Err(e) => tracing::error!("账号任务异常退出: {}", e),
            }
        }

        reports.sort_by_key(|r| r.index);
        reports
    }

    /// 运行直到全部账号结束或 `shutdown` 完成
    ///
    /// 提前停止时返回 None；所有会话任务随 `JoinSet` 一起被中止
    pub async fn run_until<S: Future>(
        &self,
        keys: Vec<String>,
        proxies: Vec<ProxyConfig>,
        shutdown: S,
    ) -> Option<Vec<AccountReport>> {
        tokio::select! {
            reports = self.run(keys, proxies) => Some(reports),
            _ = shutdown => None,
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "未知 panic".to_string())
}

async fn drive_account<L: SessionLauncher>(
    launcher: Arc<L>,
    mut account: Account,
    proxies: Arc<[ProxyConfig]>,
    max_retries: u32,
    retry_strategy: SelectionStrategy,
) -> AccountReport {
    loop {
        account.record_attempt();
        tracing::info!("启动会话 ({}/{})", account.attempts, max_retries);

        // panic 视同一次失败的会话，计入重试次数
        let result = AssertUnwindSafe(launcher.launch(account.identity.clone(), account.proxy.clone()))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(anyhow::anyhow!("会话 panic: {}", panic_message(payload))));

        match result {
            Ok(()) => {
                tracing::info!("会话结束");
                return AccountReport {
                    index: account.index,
                    address: Some(account.address().to_string()),
                    outcome: AccountOutcome::Completed {
                        attempts: account.attempts,
                    },
                };
            }
            Err(e) => {
                tracing::error!("会话失败 ({}/{}): {:#}", account.attempts, max_retries, e);
                if !account.record_failure(format!("{:#}", e), max_retries) {
                    tracing::error!("已达最大重试次数，放弃该账号");
                    return AccountReport {
                        index: account.index,
                        address: Some(account.address().to_string()),
                        outcome: AccountOutcome::Abandoned {
                            attempts: account.attempts,
                            last_error: account.last_error.clone(),
                        },
                    };
                }
                account.switch_proxy(retry_strategy.pick(account.index, &proxies));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::client::ResilientClient;
    use crate::edge::provider::{EdgeApi, Endpoints};
    use crate::session::{AccountSession, SessionConfig};
    use crate::testing::{ManualClock, ScriptedTransport};
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// 记录每次启动的地址与代理
    #[derive(Default)]
    struct RecordingLauncher {
        launches: Mutex<Vec<(String, Option<String>)>>,
        failing: HashSet<String>,
    }

    impl RecordingLauncher {
        fn failing(addresses: impl IntoIterator<Item = String>) -> Self {
            Self {
                failing: addresses.into_iter().collect(),
                ..Self::default()
            }
        }

        fn launches_of(&self, address: &str) -> Vec<Option<String>> {
            self.launches
                .lock()
                .unwrap()
                .iter()
                .filter(|(a, _)| a == address)
                .map(|(_, p)| p.clone())
                .collect()
        }
    }

    #[async_trait]
    impl SessionLauncher for RecordingLauncher {
        async fn launch(
            &self,
            identity: Arc<SigningIdentity>,
            proxy: Option<ProxyConfig>,
        ) -> anyhow::Result<()> {
            let address = identity.address().to_string();
            self.launches
                .lock()
                .unwrap()
                .push((address.clone(), proxy.map(|p| p.url)));
            tokio::task::yield_now().await;
            if self.failing.contains(&address) {
                anyhow::bail!("node start rejected");
            }
            Ok(())
        }
    }

    fn identities(n: usize) -> Vec<SigningIdentity> {
        (0..n).map(|_| SigningIdentity::generate()).collect()
    }

    fn keys(ids: &[SigningIdentity]) -> Vec<String> {
        ids.iter().map(|i| i.private_key_hex()).collect()
    }

    fn proxies(n: usize) -> Vec<ProxyConfig> {
        (0..n)
            .map(|i| ProxyConfig::new(format!("http://10.0.0.{}:3128", i)))
            .collect()
    }

    #[tokio::test]
    async fn test_single_proxy_shared_by_all() {
        let ids = identities(3);
        let scheduler = AccountScheduler::new(RecordingLauncher::default(), 5, SelectionStrategy::Random);

        let reports = scheduler.run(keys(&ids), proxies(1)).await;

        assert_eq!(reports.len(), 3);
        assert!(reports.iter().all(|r| r.is_completed()));
        for id in &ids {
            assert_eq!(
                scheduler.launcher.launches_of(id.address()),
                vec![Some("http://10.0.0.0:3128".to_string())]
            );
        }
    }

    #[tokio::test]
    async fn test_proxies_assigned_by_index() {
        let ids = identities(3);
        let scheduler = AccountScheduler::new(RecordingLauncher::default(), 5, SelectionStrategy::Random);

        let reports = scheduler.run(keys(&ids), proxies(3)).await;

        assert_eq!(
            reports.iter().map(|r| r.index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        for (i, id) in ids.iter().enumerate() {
            assert_eq!(
                scheduler.launcher.launches_of(id.address()),
                vec![Some(format!("http://10.0.0.{}:3128", i))]
            );
        }
    }

    #[tokio::test]
    async fn test_no_proxies_runs_direct() {
        let ids = identities(2);
        let scheduler = AccountScheduler::new(RecordingLauncher::default(), 5, SelectionStrategy::Random);

        scheduler.run(keys(&ids), Vec::new()).await;
        assert_eq!(scheduler.launcher.launches_of(ids[1].address()), vec![None]);
    }

    #[tokio::test]
    async fn test_failing_account_is_abandoned_after_budget() {
        let ids = identities(3);
        let bad = ids[1].address().to_string();
        let scheduler = AccountScheduler::new(
            RecordingLauncher::failing([bad.clone()]),
            5,
            SelectionStrategy::Random,
        );

        let reports = scheduler.run(keys(&ids), proxies(2)).await;

        assert!(reports[0].is_completed());
        assert!(reports[2].is_completed());
        match &reports[1].outcome {
            AccountOutcome::Abandoned { attempts, last_error } => {
                assert_eq!(*attempts, 5);
                assert!(last_error.as_deref().unwrap().contains("node start rejected"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }

        let launches = scheduler.launcher.launches_of(&bad);
        assert_eq!(launches.len(), 5);
        // 首次按序号分配，之后从池中重新挑选
        assert_eq!(launches[0].as_deref(), Some("http://10.0.0.1:3128"));
        assert!(launches.iter().all(|p| p.is_some()));
        assert_eq!(scheduler.launcher.launches_of(ids[0].address()).len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_key_is_skipped() {
        let ids = identities(1);
        let mut all = keys(&ids);
        all.insert(0, "0x1234".to_string());
        let scheduler = AccountScheduler::new(RecordingLauncher::default(), 5, SelectionStrategy::Random);

        let reports = scheduler.run(all, proxies(1)).await;

        assert!(matches!(reports[0].outcome, AccountOutcome::InvalidKey(_)));
        assert!(reports[0].address.is_none());
        assert!(reports[1].is_completed());
        assert_eq!(reports[1].address.as_deref(), Some(ids[0].address()));
    }

    /// 会话内 panic 的启动器
    struct PanickingLauncher {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl SessionLauncher for PanickingLauncher {
        async fn launch(
            &self,
            _identity: Arc<SigningIdentity>,
            _proxy: Option<ProxyConfig>,
        ) -> anyhow::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            panic!("session blew up");
        }
    }

    #[tokio::test]
    async fn test_panicking_session_is_reported() {
        let launcher = PanickingLauncher {
            calls: AtomicUsize::new(0),
        };
        let scheduler = AccountScheduler::new(launcher, 3, SelectionStrategy::Random);

        let reports = scheduler.run(keys(&identities(2)), proxies(1)).await;

        assert_eq!(reports.len(), 2);
        for (i, report) in reports.iter().enumerate() {
            assert_eq!(report.index, i);
            match &report.outcome {
                AccountOutcome::Abandoned { attempts, last_error } => {
                    assert_eq!(*attempts, 3);
                    assert!(last_error.as_deref().unwrap().contains("session blew up"));
                }
                other => panic!("unexpected outcome: {:?}", other),
            }
        }
        assert_eq!(scheduler.launcher.calls.load(Ordering::SeqCst), 6);
    }

    /// 长时间运行的会话，被丢弃时计数
    struct SleepingLauncher {
        started: Arc<AtomicUsize>,
        dropped: Arc<AtomicUsize>,
    }

    struct DropCounter(Arc<AtomicUsize>);

    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl SessionLauncher for SleepingLauncher {
        async fn launch(
            &self,
            _identity: Arc<SigningIdentity>,
            _proxy: Option<ProxyConfig>,
        ) -> anyhow::Result<()> {
            let _guard = DropCounter(self.dropped.clone());
            self.started.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(86400)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_shutdown_aborts_running_sessions() {
        let started = Arc::new(AtomicUsize::new(0));
        let dropped = Arc::new(AtomicUsize::new(0));
        let launcher = SleepingLauncher {
            started: started.clone(),
            dropped: dropped.clone(),
        };
        let scheduler = AccountScheduler::new(launcher, 5, SelectionStrategy::Random);

        let result = scheduler
            .run_until(
                keys(&identities(3)),
                proxies(1),
                tokio::time::sleep(Duration::from_millis(50)),
            )
            .await;

        assert!(result.is_none());
        assert_eq!(started.load(Ordering::SeqCst), 3);
        for _ in 0..100 {
            if dropped.load(Ordering::SeqCst) == 3 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(dropped.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_run_until_returns_reports_when_done() {
        let ids = identities(2);
        let scheduler = AccountScheduler::new(RecordingLauncher::default(), 5, SelectionStrategy::Random);

        let reports = scheduler
            .run_until(keys(&ids), Vec::new(), std::future::pending::<()>())
            .await
            .unwrap();
        assert!(reports.iter().all(|r| r.is_completed()));
    }

    /// 在脚本化传输层上运行真实会话
    struct ScriptedLauncher {
        transport: Arc<ScriptedTransport>,
        clock: Arc<ManualClock>,
    }

    #[async_trait]
    impl SessionLauncher for ScriptedLauncher {
        async fn launch(
            &self,
            identity: Arc<SigningIdentity>,
            _proxy: Option<ProxyConfig>,
        ) -> anyhow::Result<()> {
            let client = ResilientClient::new(
                self.transport.clone(),
                self.clock.clone(),
                Duration::from_secs(3),
            );
            let api = EdgeApi::new(client, Endpoints::new("https://api.test/api", "https://dash.test"));
            let config = SessionConfig {
                max_cycles: Some(1),
                ..SessionConfig::default()
            };
            AccountSession::new(identity, api, self.clock.clone(), config)
                .run()
                .await?;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_unexpected_start_reply_abandons_after_five_sessions() {
        let transport = Arc::new(ScriptedTransport::new());
        for _ in 0..5 {
            transport.push_json(
                200,
                json!({"data": {"referralCode": "r", "lastClaimed": "2025-01-15T00:00:00Z"}}),
            );
            transport.push_json(200, json!({"data": {"startTimestamp": null}}));
            transport.push_json(200, json!({"message": "unexpected"}));
        }
        let launcher = ScriptedLauncher {
            transport: transport.clone(),
            clock: Arc::new(ManualClock::default()),
        };
        let scheduler = AccountScheduler::new(launcher, 5, SelectionStrategy::Random);

        let reports = scheduler
            .run(keys(&identities(1)), proxies(3))
            .await;

        assert!(matches!(
            reports[0].outcome,
            AccountOutcome::Abandoned { attempts: 5, .. }
        ));
        assert_eq!(transport.count_matching("/start"), 5);
        assert_eq!(transport.count_matching("wallet-details"), 5);
    }
}
