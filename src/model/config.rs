use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::edge::provider::{Endpoints, DEFAULT_API_BASE, DEFAULT_DASHBOARD_BASE, DEFAULT_IP_CHECK_URL};
use crate::pool::SelectionStrategy;
use crate::session::{SessionConfig, SleepWindow};

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default = "default_api_base")]
    pub api_base: String,

    #[serde(default = "default_dashboard_base")]
    pub dashboard_base: String,

    /// 会话开始前经代理查询出口 IP，空字符串表示不检查
    #[serde(default = "default_ip_check_url")]
    pub ip_check_url: String,

    /// 已注册私钥文件（每行一个）
    #[serde(default = "default_keys_file")]
    pub keys_file: String,

    /// 待注册私钥文件
    #[serde(default = "default_pending_keys_file")]
    pub pending_keys_file: String,

    /// 代理列表文件（每行一个）
    #[serde(default = "default_proxies_file")]
    pub proxies_file: String,

    /// 注册钱包时使用的邀请码
    #[serde(default)]
    pub referral_code: Option<String>,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// 临时故障重试间隔（秒）
    #[serde(default = "default_retry_backoff_secs")]
    pub retry_backoff_secs: u64,

    /// 提交证明并领取证明/节点任务积分
    #[serde(default)]
    pub do_proof: bool,

    /// 绑定推特
    #[serde(default)]
    pub do_twitter: bool,

    /// 短休眠（60-120 秒），否则 1-6 小时
    #[serde(default)]
    pub short_sleep: bool,

    /// 每轮休眠后停止节点再重启
    #[serde(default)]
    pub stop_node: bool,

    /// 单个账号会话的最大尝试次数
    #[serde(default = "default_max_session_retries")]
    pub max_session_retries: u32,

    #[serde(default = "default_stop_attempts")]
    pub stop_attempts: u32,

    #[serde(default = "default_task_attempts")]
    pub task_attempts: u32,

    #[serde(default = "default_status_attempts")]
    pub status_attempts: u32,

    #[serde(default = "default_register_attempts")]
    pub register_attempts: u32,

    /// 每个会话的循环轮数，0 表示不限
    #[serde(default)]
    pub max_cycles: u64,

    /// 重试时更换代理的策略
    #[serde(default = "default_retry_proxy_strategy")]
    pub retry_proxy_strategy: SelectionStrategy,
}

impl Config {
    /// 从环境变量覆盖配置
    pub fn override_from_env(&mut self) {
        if let Ok(api_base) = env::var("API_BASE") {
            self.api_base = api_base;
        }
        if let Ok(dashboard_base) = env::var("DASHBOARD_BASE") {
            self.dashboard_base = dashboard_base;
        }
        if let Ok(ip_check_url) = env::var("IP_CHECK_URL") {
            self.ip_check_url = ip_check_url;
        }
        if let Ok(keys_file) = env::var("KEYS_FILE") {
            self.keys_file = keys_file;
        }
        if let Ok(pending) = env::var("PENDING_KEYS_FILE") {
            self.pending_keys_file = pending;
        }
        if let Ok(proxies_file) = env::var("PROXIES_FILE") {
            self.proxies_file = proxies_file;
        }
        if let Ok(code) = env::var("REFERRAL_CODE") {
            self.referral_code = Some(code);
        }
        if let Some(v) = env_flag("DO_PROOF") {
            self.do_proof = v;
        }
        if let Some(v) = env_flag("DO_TWITTER") {
            self.do_twitter = v;
        }
        if let Some(v) = env_flag("SHORT_SLEEP") {
            self.short_sleep = v;
        }
        if let Some(v) = env_flag("STOP_NODE") {
            self.stop_node = v;
        }
    }

    pub fn endpoints(&self) -> Endpoints {
        Endpoints::new(&self.api_base, &self.dashboard_base).with_ip_check(&self.ip_check_url)
    }

    /// 构建不可变的会话配置
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            do_proof: self.do_proof,
            do_twitter: self.do_twitter,
            stop_node: self.stop_node,
            sleep_window: if self.short_sleep {
                SleepWindow::SHORT
            } else {
                SleepWindow::LONG
            },
            stop_attempts: self.stop_attempts.max(1),
            task_attempts: self.task_attempts.max(1),
            status_attempts: self.status_attempts.max(1),
            max_cycles: (self.max_cycles > 0).then_some(self.max_cycles),
            ..SessionConfig::default()
        }
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs(self.retry_backoff_secs)
    }
}

fn env_flag(name: &str) -> Option<bool> {
    let value = env::var(name).ok()?;
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_dashboard_base() -> String {
    DEFAULT_DASHBOARD_BASE.to_string()
}

fn default_ip_check_url() -> String {
    DEFAULT_IP_CHECK_URL.to_string()
}

fn default_keys_file() -> String {
    "privatekeys.txt".to_string()
}

fn default_pending_keys_file() -> String {
    "pending_keys.txt".to_string()
}

fn default_proxies_file() -> String {
    "proxies.txt".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_retry_backoff_secs() -> u64 {
    3
}

fn default_max_session_retries() -> u32 {
    5
}

fn default_stop_attempts() -> u32 {
    50
}

fn default_task_attempts() -> u32 {
    5
}

fn default_status_attempts() -> u32 {
    6
}

fn default_register_attempts() -> u32 {
    3
}

fn default_retry_proxy_strategy() -> SelectionStrategy {
    SelectionStrategy::Random
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            dashboard_base: default_dashboard_base(),
            ip_check_url: default_ip_check_url(),
            keys_file: default_keys_file(),
            pending_keys_file: default_pending_keys_file(),
            proxies_file: default_proxies_file(),
            referral_code: None,
            request_timeout_secs: default_request_timeout_secs(),
            retry_backoff_secs: default_retry_backoff_secs(),
            do_proof: false,
            do_twitter: false,
            short_sleep: false,
            stop_node: false,
            max_session_retries: default_max_session_retries(),
            stop_attempts: default_stop_attempts(),
            task_attempts: default_task_attempts(),
            status_attempts: default_status_attempts(),
            register_attempts: default_register_attempts(),
            max_cycles: 0,
            retry_proxy_strategy: default_retry_proxy_strategy(),
        }
    }
}

impl Config {
    /// 获取默认配置文件路径
    pub fn default_config_path() -> &'static str {
        "config.json"
    }

    /// 从文件加载配置
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            // 配置文件不存在，返回默认配置
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }
}
