//! LayerEdge API 客户端
//!
//! - `transport`: 单次 HTTP 往返
//! - `client`: 响应分类与临时故障重试
//! - `provider`: 类型化的接口调用
//! - `signer`: 钱包签名身份
//! - `model`: 请求/响应数据模型
//! - `faker`: 随机填充数据

pub mod client;
pub mod faker;
pub mod model;
pub mod provider;
pub mod signer;
pub mod transport;
