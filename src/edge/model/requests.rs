//! 签名请求与请求体
//!
//! 每次调用都用新的毫秒时间戳重新签名，签名不会跨调用复用

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::edge::signer::SigningIdentity;

/// 需要签名的操作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignedAction {
    DailyClaim,
    NodeStart,
    NodeStop,
    ProofPoints,
    NodeTaskPoints,
    TwitterLink,
}

impl SignedAction {
    /// 待签名的明文
    pub fn message(&self, address: &str, timestamp: i64) -> String {
        match self {
            Self::DailyClaim => format!(
                "I am claiming my daily node point for {} at {}",
                address, timestamp
            ),
            Self::NodeStart => format!("Node activation request for {} at {}", address, timestamp),
            Self::NodeStop => format!("Node deactivation request for {} at {}", address, timestamp),
            Self::ProofPoints => format!(
                "I am claiming my proof submission node points for {} at {}",
                address, timestamp
            ),
            Self::NodeTaskPoints => format!(
                "I am claiming my light node run task node points for {} at {}",
                address, timestamp
            ),
            Self::TwitterLink => format!(
                "I am verifying my Twitter authentication for {} at {}",
                address, timestamp
            ),
        }
    }
}

/// 一次性的签名凭证
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    pub wallet_address: String,
    pub timestamp: i64,
    pub signature: String,
}

impl SignedRequest {
    pub fn new(
        identity: &SigningIdentity,
        action: SignedAction,
        timestamp: i64,
    ) -> anyhow::Result<Self> {
        let message = action.message(identity.address(), timestamp);
        Ok(Self {
            wallet_address: identity.address().to_string(),
            timestamp,
            signature: identity.sign_message(&message)?,
        })
    }

    /// 领取类接口的请求体
    pub fn claim_body(&self) -> ClaimBody {
        ClaimBody {
            wallet_address: self.wallet_address.clone(),
            timestamp: self.timestamp,
            sign: self.signature.clone(),
            twitter_id: None,
        }
    }

    /// 节点启停接口的请求体
    pub fn node_action_body(&self) -> NodeActionBody {
        NodeActionBody {
            sign: self.signature.clone(),
            timestamp: self.timestamp,
        }
    }
}

/// 领取每日积分 / 任务积分 / 绑定推特
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimBody {
    pub wallet_address: String,
    pub timestamp: i64,
    pub sign: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub twitter_id: Option<String>,
}

impl ClaimBody {
    pub fn with_twitter_id(mut self, twitter_id: impl Into<String>) -> Self {
        self.twitter_id = Some(twitter_id.into());
        self
    }
}

/// 启动 / 停止节点
#[derive(Debug, Clone, Serialize)]
pub struct NodeActionBody {
    pub sign: String,
    pub timestamp: i64,
}

/// 提交证明
#[derive(Debug, Clone, Serialize)]
pub struct ProofSubmission {
    pub address: String,
    pub message: String,
    pub proof: String,
    pub signature: String,
}

impl ProofSubmission {
    pub fn new(identity: &SigningIdentity, at: DateTime<Utc>, proof: String) -> anyhow::Result<Self> {
        let message = proof_message(at);
        Ok(Self {
            address: identity.address().to_string(),
            signature: identity.sign_message(&message)?,
            message,
            proof,
        })
    }
}

/// 证明提交的签名明文（UTC 毫秒精度）
pub fn proof_message(at: DateTime<Utc>) -> String {
    format!(
        "I am submitting a proof for LayerEdge at {}",
        at.format("%Y-%m-%dT%H:%M:%S%.3fZ")
    )
}

/// 注册钱包
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterWalletBody {
    pub wallet_address: String,
}
