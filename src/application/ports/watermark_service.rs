//! Watermark Service Port - 远端水印服务抽象
//!
//! 定义与远端水印服务交互的抽象接口，具体实现在 infrastructure/adapters 层

use async_trait::async_trait;
use serde::Serialize;
use std::num::NonZeroU32;
use thiserror::Error;

use crate::domain::{EmbeddingMethod, ImagePayload, LengthSuggestion, OperationResult, RequestError};

/// 网关错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// 之前的健康探测已判定服务不可达，请求未发出
    #[error("Service unavailable")]
    ServiceUnavailable,

    /// 连接级失败，没有收到任何响应
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timeout")]
    Timeout,

    /// 收到了非 2xx 响应
    #[error("HTTP {status}: {body}")]
    Transport { status: u16, body: String },

    /// 2xx 但响应体无法解析或缺少必需字段
    #[error("Invalid response: {0}")]
    Protocol(String),

    /// 配置的服务地址无法使用（只在构造网关时出现）
    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),
}

impl GatewayError {
    pub fn status(&self) -> Option<u16> {
        match self {
            GatewayError::Transport { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// 健康探测结果（会被缓存）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthStatus {
    pub reachable: bool,
    pub message: String,
}

/// 健康检查报告（不缓存，直接反映服务端当前返回）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub success: bool,
    /// 服务端上报的状态，失败时为 "unhealthy"
    pub status: String,
    pub message: String,
}

impl HealthReport {
    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            success: false,
            status: "unhealthy".to_string(),
            message: message.into(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// Watermark Service Port
///
/// 每个逻辑操作对应一次 HTTP 交换；不重试、不排队。
#[async_trait]
pub trait WatermarkServicePort: Send + Sync {
    /// 探测服务是否可达
    ///
    /// 每个网关实例只真正探测一次，之后返回缓存值。
    async fn probe_health(&self) -> HealthStatus;

    /// 直接调用健康检查接口，不读写可达性缓存，不返回错误
    async fn health_check(&self) -> HealthReport;

    async fn add_watermark(
        &self,
        image: &ImagePayload,
        text: &str,
        method: &EmbeddingMethod,
    ) -> Result<OperationResult, GatewayError>;

    /// 检测水印；不发送长度参数，由服务端推断
    async fn detect_watermark(
        &self,
        image: &ImagePayload,
        expected_text: &str,
        method: &EmbeddingMethod,
    ) -> Result<OperationResult, GatewayError>;

    async fn scan_watermarks(
        &self,
        image: &ImagePayload,
        method: &EmbeddingMethod,
        max_length: u32,
        verbose: bool,
    ) -> Result<OperationResult, GatewayError>;

    async fn extract_watermark(
        &self,
        image: &ImagePayload,
        method: &EmbeddingMethod,
        length: Option<NonZeroU32>,
    ) -> Result<OperationResult, GatewayError>;

    /// 长度建议；服务不可达时返回本地降级结果，而不是错误
    async fn suggest_length(&self, text: &str) -> Result<LengthSuggestion, GatewayError>;

    /// 构造下载地址（纯函数，无 I/O）
    fn download_reference(&self, filename: &str) -> Result<String, RequestError>;

    /// 当前使用的服务基础地址
    fn api_base(&self) -> &str;
}
