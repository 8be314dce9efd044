//! 时钟抽象
//!
//! 会话与 HTTP 重试循环中所有的"当前时间"和"等待"都经由 [`Clock`]，
//! 测试时替换为手动时钟即可零延迟地跑完重试与休眠逻辑

use async_trait::async_trait;
use chrono::{DateTime, Local};
use std::time::Duration;

/// 时间来源
#[async_trait]
pub trait Clock: Send + Sync {
    /// 当前本地时间
    fn now(&self) -> DateTime<Local>;

    /// 等待指定时长
    async fn sleep(&self, duration: Duration);

    /// 当前毫秒时间戳（签名消息使用）
    fn timestamp_millis(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

/// 系统时钟
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// 在闭区间 `[min, max]` 秒内均匀取一个随机时长
pub fn random_secs(min: u64, max: u64) -> Duration {
    let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
    Duration::from_secs(fastrand::u64(lo..=hi))
}
