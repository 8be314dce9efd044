//! 接口响应类型

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;

use crate::edge::client::{ApiError, Payload};

/// `{ "data": ... }` 外层包装
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub data: Option<T>,
}

/// 钱包详情
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletDetails {
    #[serde(default)]
    pub referral_code: Option<String>,
    #[serde(default)]
    pub node_points: Option<Value>,
    /// 上次每日领取时间（ISO 8601）
    #[serde(default)]
    pub last_claimed: Option<String>,
}

impl WalletDetails {
    pub fn claim_window(&self) -> ClaimWindow {
        ClaimWindow::from_last_claimed(self.last_claimed.as_deref())
    }

    /// 积分展示文本
    pub fn points_display(&self) -> String {
        match &self.node_points {
            Some(Value::Null) | None => "-".to_string(),
            Some(v) => v.to_string(),
        }
    }
}

/// 每日领取窗口
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ClaimWindow {
    pub last_claimed: Option<NaiveDate>,
}

impl ClaimWindow {
    /// 取 `T` 之前的日期部分；缺失或无法解析时视为从未领取
    pub fn from_last_claimed(last_claimed: Option<&str>) -> Self {
        let last_claimed = last_claimed
            .and_then(|s| s.split('T').next())
            .and_then(|day| NaiveDate::parse_from_str(day.trim(), "%Y-%m-%d").ok());
        Self { last_claimed }
    }

    /// 今天是否还需要领取
    pub fn is_due(&self, today: NaiveDate) -> bool {
        self.last_claimed != Some(today)
    }
}

/// 节点状态
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStatus {
    #[serde(default)]
    pub start_timestamp: Option<Value>,
}

impl NodeStatus {
    /// `startTimestamp` 缺失、null、0 或空串都表示节点未运行
    pub fn is_running(&self) -> bool {
        match &self.start_timestamp {
            None | Some(Value::Null) | Some(Value::Bool(false)) => false,
            Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
            Some(Value::String(s)) => !s.is_empty(),
            Some(_) => true,
        }
    }
}

/// 证明提交状态
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofStatus {
    #[serde(default)]
    pub has_submitted: Option<bool>,
}

/// 写接口的通用回复
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiReply {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub error: Option<Value>,
}

impl ApiReply {
    /// 从成功响应解析；非 JSON 时返回 None
    pub fn from_payload(payload: &Payload) -> Option<Self> {
        payload
            .as_json()
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// 从被拒绝的响应解析（例如 409 "already completed"）
    pub fn from_error(err: &ApiError) -> Option<Self> {
        let mut reply: Self = serde_json::from_value(err.payload()?.clone()).ok()?;
        if reply.status_code.is_none() {
            reply.status_code = err.status();
        }
        Some(reply)
    }

    pub fn message(&self) -> &str {
        self.message.as_deref().unwrap_or_default()
    }

    pub fn message_is(&self, expected: &str) -> bool {
        self.message.as_deref() == Some(expected)
    }

    pub fn message_contains(&self, expected: &str) -> bool {
        self.message().contains(expected)
    }

    /// `error` 字段的文本形式
    pub fn error_text(&self) -> Option<String> {
        match &self.error {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        }
    }

    /// `data` 中的布尔字段
    pub fn data_flag(&self, key: &str) -> Option<bool> {
        self.data.as_ref()?.get(key)?.as_bool()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_wallet_details_parse() {
        let envelope: Envelope<WalletDetails> = serde_json::from_value(json!({
            "data": {
                "referralCode": "abc123",
                "nodePoints": 4200,
                "lastClaimed": "2025-01-14T08:30:00.000Z",
                "extra": true
            }
        }))
        .unwrap();
        let details = envelope.data.unwrap();
        assert_eq!(details.referral_code.as_deref(), Some("abc123"));
        assert_eq!(details.points_display(), "4200");
        assert_eq!(details.claim_window().last_claimed, Some(day("2025-01-14")));
    }

    #[test]
    fn test_envelope_without_data() {
        let envelope: Envelope<WalletDetails> = serde_json::from_value(json!({"message": "x"})).unwrap();
        assert!(envelope.data.is_none());
    }

    #[test]
    fn test_claim_window_due() {
        let today = day("2025-01-15");
        assert!(ClaimWindow::from_last_claimed(None).is_due(today));
        assert!(ClaimWindow::from_last_claimed(Some("2025-01-14T23:59:59Z")).is_due(today));
        assert!(ClaimWindow::from_last_claimed(Some("garbage")).is_due(today));
        assert!(!ClaimWindow::from_last_claimed(Some("2025-01-15T00:00:01Z")).is_due(today));
        assert!(!ClaimWindow::from_last_claimed(Some("2025-01-15")).is_due(today));
    }

    #[test]
    fn test_node_status_running() {
        let status = |v: Value| -> NodeStatus {
            let envelope: Envelope<NodeStatus> = serde_json::from_value(json!({ "data": v })).unwrap();
            envelope.data.unwrap_or_default()
        };
        assert!(!status(json!({})).is_running());
        assert!(!status(json!({"startTimestamp": null})).is_running());
        assert!(!status(json!({"startTimestamp": 0})).is_running());
        assert!(!status(json!({"startTimestamp": ""})).is_running());
        assert!(status(json!({"startTimestamp": 1736899200})).is_running());
        assert!(status(json!({"startTimestamp": "2025-01-15T00:00:00Z"})).is_running());
        assert!(!status(Value::Null).is_running());
    }

    #[test]
    fn test_reply_from_error_payload() {
        let err = ApiError::Rejected {
            status: 409,
            message: "node run task is already completed".to_string(),
            payload: Some(json!({"message": "node run task is already completed"})),
        };
        let reply = ApiReply::from_error(&err).unwrap();
        assert_eq!(reply.status_code, Some(409));
        assert!(reply.message_is("node run task is already completed"));
    }

    #[test]
    fn test_reply_helpers() {
        let payload = Payload::Json(json!({
            "message": "Twitter authentication verified",
            "data": {"isFirstTimeTwitterAuth": false},
            "error": {"code": 1}
        }));
        let reply = ApiReply::from_payload(&payload).unwrap();
        assert!(reply.message_contains("authentication"));
        assert_eq!(reply.data_flag("isFirstTimeTwitterAuth"), Some(false));
        assert_eq!(reply.error_text().as_deref(), Some(r#"{"code":1}"#));
        assert!(ApiReply::from_payload(&Payload::Text("ok".into())).is_none());
    }
}
