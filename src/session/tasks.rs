//! 一次性任务：提交证明、领取任务积分、绑定推特
//!
//! 每个任务最多尝试 `task_attempts` 次，每次重新签名；
//! 服务端明确返回"已完成"时视同成功，不再重试

use chrono::Utc;
use std::future::Future;

use super::AccountSession;
use crate::edge::client::ApiError;
use crate::edge::faker;
use crate::edge::model::requests::{ProofSubmission, SignedAction};
use crate::edge::model::wallet::ApiReply;
use crate::edge::provider::TaskEndpoint;

const PROOF_POINTS_OK: &str = "proof submission task completed successfully";
const PROOF_POINTS_DONE: &str = "proof submission task is already completed";
const NODE_POINTS_OK: &str = "node points task completed successfully";
const NODE_POINTS_DONE: &str = "node run task is already completed";
const TWITTER_VERIFIED: &str = "Twitter authentication verified";
const TWITTER_LINKED_ELSEWHERE: &str = "Your wallet is already linked with a different Twitter account";
const PROOF_ALREADY_SUBMITTED: &str = "Proof already submitted";

/// 任务结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// 本次完成
    Completed,
    /// 服务端确认此前已完成
    AlreadyDone,
    /// 用尽尝试次数或无法判断
    GaveUp,
}

impl TaskOutcome {
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Completed | Self::AlreadyDone)
    }
}

/// 单次尝试的判定
enum Verdict {
    Done(TaskOutcome),
    Retry(String),
}

/// 积分任务
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PointsTask {
    ProofSubmission,
    NodeRun,
}

impl PointsTask {
    fn action(&self) -> SignedAction {
        match self {
            Self::ProofSubmission => SignedAction::ProofPoints,
            Self::NodeRun => SignedAction::NodeTaskPoints,
        }
    }

    fn endpoint(&self) -> TaskEndpoint {
        match self {
            Self::ProofSubmission => TaskEndpoint::ProofPoints,
            Self::NodeRun => TaskEndpoint::NodePoints,
        }
    }

    fn markers(&self) -> (&'static str, &'static str) {
        match self {
            Self::ProofSubmission => (PROOF_POINTS_OK, PROOF_POINTS_DONE),
            Self::NodeRun => (NODE_POINTS_OK, NODE_POINTS_DONE),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::ProofSubmission => "领取证明任务积分",
            Self::NodeRun => "领取节点运行任务积分",
        }
    }
}

/// 成功回复与被拒绝回复都按 JSON 解析出来
fn reply_of(result: Result<ApiReply, ApiError>) -> Result<ApiReply, String> {
    match result {
        Ok(reply) => Ok(reply),
        Err(e) => ApiReply::from_error(&e).ok_or_else(|| e.to_string()),
    }
}

impl AccountSession {
    /// 有限次重试，直到判定为完成
    async fn with_attempts<F, Fut>(&self, label: &str, mut attempt: F) -> TaskOutcome
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Verdict>,
    {
        let max = self.config.task_attempts;
        for n in 1..=max {
            match attempt().await {
                Verdict::Done(outcome) => return outcome,
                Verdict::Retry(reason) => {
                    tracing::warn!("{}失败 ({}/{}): {}", label, n, max, reason);
                    if n < max {
                        self.clock.sleep(self.config.task_backoff).await;
                    }
                }
            }
        }
        tracing::warn!("{}已达最大尝试次数，放弃", label);
        TaskOutcome::GaveUp
    }

    /// 领取任务积分
    pub(crate) async fn claim_points(&self, task: PointsTask) -> TaskOutcome {
        let outcome = self
            .with_attempts(task.label(), move || self.try_claim_points(task))
            .await;
        match outcome {
            TaskOutcome::Completed => tracing::info!("{}成功", task.label()),
            TaskOutcome::AlreadyDone => tracing::info!("{}：此前已完成", task.label()),
            TaskOutcome::GaveUp => {}
        }
        outcome
    }

    async fn try_claim_points(&self, task: PointsTask) -> Verdict {
        let request = match self.sign(task.action()) {
            Ok(request) => request,
            Err(e) => return Verdict::Retry(e.to_string()),
        };
        let reply = match reply_of(self.api.claim_task(task.endpoint(), &request.claim_body()).await) {
            Ok(reply) => reply,
            Err(reason) => return Verdict::Retry(reason),
        };

        let (ok, done) = task.markers();
        if reply.message_is(ok) {
            Verdict::Done(TaskOutcome::Completed)
        } else if reply.status_code == Some(409) && reply.message_is(done) {
            Verdict::Done(TaskOutcome::AlreadyDone)
        } else {
            Verdict::Retry(format!("意外回复: {}", reply.message()))
        }
    }

    /// 绑定推特（随机用户名）
    pub(crate) async fn link_twitter(&self) -> TaskOutcome {
        let twitter_id = faker::twitter_username();
        tracing::info!("绑定推特账号: {}", twitter_id);

        let username = twitter_id.as_str();
        let outcome = self
            .with_attempts("绑定推特", move || self.try_link_twitter(username))
            .await;
        match outcome {
            TaskOutcome::Completed => tracing::info!("推特绑定成功"),
            TaskOutcome::AlreadyDone => tracing::info!("推特此前已绑定"),
            TaskOutcome::GaveUp => {}
        }
        outcome
    }

    async fn try_link_twitter(&self, twitter_id: &str) -> Verdict {
        let request = match self.sign(SignedAction::TwitterLink) {
            Ok(request) => request,
            Err(e) => return Verdict::Retry(e.to_string()),
        };
        let body = request.claim_body().with_twitter_id(twitter_id);
        let reply = match reply_of(self.api.claim_task(TaskEndpoint::ConnectTwitter, &body).await) {
            Ok(reply) => reply,
            Err(reason) => return Verdict::Retry(reason),
        };

        if reply.message_is(TWITTER_VERIFIED) {
            if reply.data_flag("isFirstTimeTwitterAuth").unwrap_or(true) {
                Verdict::Done(TaskOutcome::Completed)
            } else {
                Verdict::Done(TaskOutcome::AlreadyDone)
            }
        } else if reply.message_is(TWITTER_LINKED_ELSEWHERE) {
            Verdict::Done(TaskOutcome::AlreadyDone)
        } else {
            Verdict::Retry(format!("意外回复: {}", reply.message()))
        }
    }

    /// 提交证明，并在证明到位后领取两项任务积分
    pub(crate) async fn submit_proof(&self) -> TaskOutcome {
        let status = match self.api.proof_status(self.address()).await {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!("查询证明状态失败: {}", e);
                return TaskOutcome::GaveUp;
            }
        };

        let outcome = match status.has_submitted {
            Some(true) => {
                tracing::info!("证明此前已提交");
                TaskOutcome::AlreadyDone
            }
            Some(false) => {
                self.with_attempts("提交证明", move || self.try_send_proof())
                    .await
            }
            None => {
                tracing::warn!("证明状态响应无效");
                return TaskOutcome::GaveUp;
            }
        };

        if outcome.is_settled() {
            self.claim_points(PointsTask::ProofSubmission).await;
            self.claim_points(PointsTask::NodeRun).await;
        }
        outcome
    }

    async fn try_send_proof(&self) -> Verdict {
        let at = self.clock.now().with_timezone(&Utc);
        let submission = match ProofSubmission::new(&self.identity, at, faker::sentence(8)) {
            Ok(submission) => submission,
            Err(e) => return Verdict::Retry(format!("签名失败: {}", e)),
        };
        let reply = match reply_of(self.api.send_proof(&submission).await) {
            Ok(reply) => reply,
            Err(reason) => return Verdict::Retry(reason),
        };

        if reply.success == Some(true) {
            tracing::info!("证明提交成功: {}", reply.message());
            Verdict::Done(TaskOutcome::Completed)
        } else if reply
            .error_text()
            .is_some_and(|e| e.contains(PROOF_ALREADY_SUBMITTED))
        {
            Verdict::Done(TaskOutcome::AlreadyDone)
        } else {
            Verdict::Retry(format!(
                "意外回复: {}",
                reply.error_text().unwrap_or_else(|| reply.message().to_string())
            ))
        }
    }
}
