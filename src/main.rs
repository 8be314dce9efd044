mod clock;
mod edge;
mod http_client;
mod keystore;
mod model;
mod pool;
mod register;
mod session;
#[cfg(test)]
mod testing;

use anyhow::Context;
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use clock::{Clock, SystemClock};
use edge::client::ResilientClient;
use edge::provider::EdgeApi;
use edge::transport::ReqwestTransport;
use http_client::ProxyConfig;
use model::arg::{Args, Command};
use model::config::Config;
use pool::{AccountOutcome, AccountScheduler};
use register::Registrar;
use session::EdgeLauncher;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| Config::default_config_path().to_string());
    let mut config = Config::load(&config_path)
        .with_context(|| format!("加载配置失败: {}", config_path))?;
    config.override_from_env();

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    match args.command() {
        Command::Run { cycles } => {
            if let Some(cycles) = cycles {
                config.max_cycles = cycles;
            }
            run(&config, clock).await
        }
        Command::Generate { count } => {
            let keys = keystore::generate_keys(&config.pending_keys_file, count)?;
            tracing::info!("已生成 {} 个钱包，写入 {}", keys.len(), config.pending_keys_file);
            Ok(())
        }
        Command::Register { referral_code } => {
            let code = referral_code
                .or_else(|| config.referral_code.clone())
                .context("未配置邀请码（--referral-code 或 REFERRAL_CODE）")?;
            register(&config, clock, &code).await
        }
    }
}

async fn run(config: &Config, clock: Arc<dyn Clock>) -> anyhow::Result<()> {
    keystore::ensure_file(&config.keys_file)?;
    keystore::ensure_file(&config.proxies_file)?;

    let keys = keystore::read_lines(&config.keys_file)?;
    if keys.is_empty() {
        tracing::warn!("私钥文件为空: {}", config.keys_file);
        return Ok(());
    }

    let proxies: Vec<ProxyConfig> = keystore::read_lines(&config.proxies_file)?
        .iter()
        .filter_map(|line| {
            let proxy = ProxyConfig::parse(line);
            if proxy.is_none() {
                tracing::warn!("忽略无法解析的代理: {}", line);
            }
            proxy
        })
        .collect();

    tracing::info!(
        "加载 {} 个账号, {} 个代理，重试时按 {} 更换代理",
        keys.len(),
        proxies.len(),
        config.retry_proxy_strategy.as_str()
    );
    if proxies.is_empty() {
        tracing::warn!("未配置代理，所有账号直连");
    }

    let scheduler = AccountScheduler::new(
        EdgeLauncher::from_config(config, clock),
        config.max_session_retries,
        config.retry_proxy_strategy,
    );

    match scheduler
        .run_until(keys, proxies, tokio::signal::ctrl_c())
        .await
    {
        Some(reports) => {
            let completed = reports.iter().filter(|r| r.is_completed()).count();
            let invalid = reports
                .iter()
                .filter(|r| matches!(r.outcome, AccountOutcome::InvalidKey(_)))
                .count();
            tracing::info!(
                "运行结束: 完成 {}, 放弃 {}, 无效私钥 {}",
                completed,
                reports.len() - completed - invalid,
                invalid
            );
        }
        None => tracing::info!("收到中断信号，退出"),
    }
    Ok(())
}

async fn register(config: &Config, clock: Arc<dyn Clock>, referral_code: &str) -> anyhow::Result<()> {
    keystore::ensure_file(&config.pending_keys_file)?;
    keystore::ensure_file(&config.keys_file)?;

    let endpoints = config.endpoints();
    let transport = ReqwestTransport::new(None, config.request_timeout_secs, endpoints.dashboard_base())?;
    let client = ResilientClient::new(Arc::new(transport), clock.clone(), config.retry_backoff());
    let registrar = Registrar::new(EdgeApi::new(client, endpoints), clock, config.register_attempts);

    let summary = registrar
        .register_pending(
            referral_code,
            Path::new(&config.pending_keys_file),
            Path::new(&config.keys_file),
        )
        .await?;
    tracing::info!(
        "注册结束: 成功 {}, 已注册 {}, 失败 {}, 无效 {}",
        summary.registered,
        summary.already_registered,
        summary.failed,
        summary.invalid
    );
    Ok(())
}
