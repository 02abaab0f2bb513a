//! Watermark Gateway Adapter - 远端水印服务的 HTTP 实现

mod http_gateway;
mod wire;

pub use http_gateway::*;
