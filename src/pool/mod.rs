//! 账号池模块
//!
//! 提供多账号调度、代理分配和状态追踪功能

pub mod account;
pub mod scheduler;
pub mod strategy;

pub use account::Account;
pub use scheduler::{AccountOutcome, AccountScheduler, SessionLauncher};
pub use strategy::SelectionStrategy;
