//! LayerEdge 数据模型
//!
//! - `wallet`: 接口响应类型
//! - `requests`: 签名请求与请求体

pub mod requests;
pub mod wallet;
