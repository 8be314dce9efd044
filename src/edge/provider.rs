//! LayerEdge API Provider
//!
//! 负责拼接各个接口地址、发送请求并把响应解析为类型化结构

use serde::de::DeserializeOwned;

use crate::edge::client::{ApiError, Payload, ResilientClient};
use crate::edge::model::requests::{ClaimBody, NodeActionBody, ProofSubmission, RegisterWalletBody};
use crate::edge::model::wallet::{ApiReply, Envelope, NodeStatus, ProofStatus, WalletDetails};

/// 默认 API 地址
pub const DEFAULT_API_BASE: &str = "https://referralapi.layeredge.io/api";

/// 默认面板地址
pub const DEFAULT_DASHBOARD_BASE: &str = "https://dashboard.layeredge.io";

/// 默认出口 IP 查询地址
pub const DEFAULT_IP_CHECK_URL: &str = "https://ipv4.webshare.io";

/// 节点操作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeAction {
    Start,
    Stop,
}

impl NodeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
        }
    }
}

/// 任务积分接口
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskEndpoint {
    ProofPoints,
    NodePoints,
    ConnectTwitter,
}

impl TaskEndpoint {
    fn path(&self) -> &'static str {
        match self {
            Self::ProofPoints => "proof-submission",
            Self::NodePoints => "node-points",
            Self::ConnectTwitter => "connect-twitter",
        }
    }
}

/// 接口地址
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    api_base: String,
    dashboard_base: String,
    /// 为 None 时跳过出口 IP 检查
    ip_check: Option<String>,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE, DEFAULT_DASHBOARD_BASE).with_ip_check(DEFAULT_IP_CHECK_URL)
    }
}

impl Endpoints {
    pub fn new(api_base: impl Into<String>, dashboard_base: impl Into<String>) -> Self {
        let api_base: String = api_base.into();
        let dashboard_base: String = dashboard_base.into();
        Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            dashboard_base: dashboard_base.trim_end_matches('/').to_string(),
            ip_check: None,
        }
    }

    /// 设置出口 IP 查询地址；空字符串表示关闭
    pub fn with_ip_check(mut self, url: impl Into<String>) -> Self {
        let url: String = url.into();
        let url = url.trim();
        self.ip_check = (!url.is_empty()).then(|| url.to_string());
        self
    }

    pub fn ip_check(&self) -> Option<&str> {
        self.ip_check.as_deref()
    }

    pub fn dashboard_base(&self) -> &str {
        &self.dashboard_base
    }

    pub fn wallet_details(&self, address: &str) -> String {
        format!("{}/referral/wallet-details/{}", self.api_base, address)
    }

    pub fn node_status(&self, address: &str) -> String {
        format!("{}/light-node/node-status/{}", self.api_base, address)
    }

    pub fn node_action(&self, address: &str, action: NodeAction) -> String {
        format!(
            "{}/light-node/node-action/{}/{}",
            self.api_base,
            address,
            action.as_str()
        )
    }

    pub fn claim_daily(&self) -> String {
        format!("{}/light-node/claim-node-points", self.api_base)
    }

    pub fn task(&self, task: TaskEndpoint) -> String {
        format!("{}/task/{}", self.api_base, task.path())
    }

    pub fn register_wallet(&self, referral_code: &str) -> String {
        format!("{}/referral/register-wallet/{}", self.api_base, referral_code)
    }

    pub fn proof_status(&self, address: &str) -> String {
        format!("{}/api/proofs/status?address={}", self.dashboard_base, address)
    }

    pub fn send_proof(&self) -> String {
        format!("{}/api/send-proof", self.dashboard_base)
    }
}

/// LayerEdge API
#[derive(Clone)]
pub struct EdgeApi {
    client: ResilientClient,
    endpoints: Endpoints,
}

impl EdgeApi {
    pub fn new(client: ResilientClient, endpoints: Endpoints) -> Self {
        Self { client, endpoints }
    }

    /// 经当前代理查询出口 IP；未配置查询地址时返回 None
    pub async fn egress_ip(&self) -> Result<Option<String>, ApiError> {
        let Some(url) = self.endpoints.ip_check() else {
            return Ok(None);
        };
        let ip = match self.client.get(url).await? {
            Payload::Text(text) => text.trim().to_string(),
            Payload::Json(value) => value
                .get("ip")
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .unwrap_or_else(|| value.to_string()),
        };
        if ip.is_empty() {
            return Err(ApiError::Unexpected("出口 IP 响应为空".to_string()));
        }
        Ok(Some(ip))
    }

    /// 钱包详情（邀请码、积分、上次领取时间）
    pub async fn wallet_details(&self, address: &str) -> Result<WalletDetails, ApiError> {
        let payload = self.client.get(&self.endpoints.wallet_details(address)).await?;
        decode_data(payload)
    }

    /// 节点运行状态
    pub async fn node_status(&self, address: &str) -> Result<NodeStatus, ApiError> {
        let payload = self.client.get(&self.endpoints.node_status(address)).await?;
        decode_data(payload)
    }

    /// 领取每日积分
    pub async fn claim_daily(&self, body: &ClaimBody) -> Result<ApiReply, ApiError> {
        let payload = self.client.post(&self.endpoints.claim_daily(), body).await?;
        Ok(decode_reply(payload))
    }

    /// 启动 / 停止节点
    pub async fn node_action(
        &self,
        address: &str,
        action: NodeAction,
        body: &NodeActionBody,
    ) -> Result<ApiReply, ApiError> {
        let url = self.endpoints.node_action(address, action);
        let payload = self.client.post(&url, body).await?;
        Ok(decode_reply(payload))
    }

    /// 领取任务积分 / 绑定推特
    pub async fn claim_task(&self, task: TaskEndpoint, body: &ClaimBody) -> Result<ApiReply, ApiError> {
        let payload = self.client.post(&self.endpoints.task(task), body).await?;
        Ok(decode_reply(payload))
    }

    /// 证明提交状态（面板接口，无 data 包装）
    pub async fn proof_status(&self, address: &str) -> Result<ProofStatus, ApiError> {
        let payload = self.client.get(&self.endpoints.proof_status(address)).await?;
        let value = payload
            .into_json()
            .ok_or_else(|| ApiError::Unexpected("证明状态响应不是 JSON".to_string()))?;
        serde_json::from_value(value).map_err(|e| ApiError::Unexpected(e.to_string()))
    }

    /// 提交证明
    pub async fn send_proof(&self, body: &ProofSubmission) -> Result<ApiReply, ApiError> {
        let payload = self.client.post(&self.endpoints.send_proof(), body).await?;
        Ok(decode_reply(payload))
    }

    /// 用邀请码注册钱包
    pub async fn register_wallet(&self, referral_code: &str, address: &str) -> Result<ApiReply, ApiError> {
        let body = RegisterWalletBody {
            wallet_address: address.to_string(),
        };
        let url = self.endpoints.register_wallet(referral_code);
        let payload = self.client.post(&url, &body).await?;
        Ok(decode_reply(payload))
    }
}

fn decode_data<T: DeserializeOwned + Default>(payload: Payload) -> Result<T, ApiError> {
    let value = payload
        .into_json()
        .ok_or_else(|| ApiError::Unexpected("响应不是 JSON".to_string()))?;
    let envelope: Envelope<T> =
        serde_json::from_value(value).map_err(|e| ApiError::Unexpected(e.to_string()))?;
    Ok(envelope.data.unwrap_or_default())
}

/// 非 JSON 的回复把正文当作 message 保留，便于日志排查
fn decode_reply(payload: Payload) -> ApiReply {
    match payload {
        Payload::Json(_) => ApiReply::from_payload(&payload).unwrap_or_default(),
        Payload::Text(text) => ApiReply {
            message: Some(text),
            ..ApiReply::default()
        },
    }
}
