//! Watermark Client - 远端图片水印服务的客户端编排层
//!
//! 架构设计: DDD + Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - Watermark Context: 操作请求、结构化结果、调用方契约校验
//!
//! 应用层 (application/):
//! - Ports: WatermarkServicePort（网关抽象与失败分类）
//! - Operation: OperationController（pending / settled 生命周期）
//!
//! 基础设施层 (infrastructure/):
//! - Adapters: HTTP 网关（multipart 请求、响应校验）
//! - Memory: 服务可达性缓存

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config, AppConfig};
