//! HTTP Watermark Gateway - 调用远端水印 HTTP 服务
//!
//! 实现 WatermarkServicePort trait，所有请求体都是 multipart 表单
//!
//! 远端 API:
//! GET  {base}/api/health
//! POST {base}/api/watermark/add             image, text, method
//! POST {base}/api/watermark/detect          image, watermark, method
//! POST {base}/api/watermark/scan            image, method, max_length, verbose
//! POST {base}/api/watermark/extract         image, method, length?
//! POST {base}/api/watermark/suggest-length  text
//! GET  {base}/api/download/{filename}

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use super::wire::{
    self, AddReply, DetectReply, ExtractReply, HealthReply, Reply, ScanReply, SuggestLengthReply,
};
use crate::application::ports::{GatewayError, HealthReport, HealthStatus, WatermarkServicePort};
use crate::domain::{
    EmbeddingMethod, ImagePayload, LengthSuggestion, OperationKind, OperationOutcome,
    OperationResult, RequestError,
};
use crate::infrastructure::memory::AvailabilityCache;

/// 长度建议降级时的提示
pub const SUGGEST_UNAVAILABLE_MESSAGE: &str = "🔌 API服务器暂时不可用，建议长度功能暂时不可用";

/// HTTP 网关配置
#[derive(Debug, Clone)]
pub struct HttpWatermarkGatewayConfig {
    /// 服务基础 URL
    pub base_url: String,
    /// 请求超时时间（秒）
    pub timeout_secs: u64,
    /// 健康探测超时时间（秒）
    pub health_timeout_secs: u64,
}

impl Default for HttpWatermarkGatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_secs: 120,
            health_timeout_secs: 5,
        }
    }
}

impl HttpWatermarkGatewayConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_health_timeout(mut self, secs: u64) -> Self {
        self.health_timeout_secs = secs;
        self
    }
}

/// HTTP 水印网关
///
/// 持有自己的可达性缓存；多个网关可以通过 `with_availability` 共享同一个缓存。
pub struct HttpWatermarkGateway {
    client: Client,
    config: HttpWatermarkGatewayConfig,
    base: Url,
    api_base: String,
    availability: Arc<AvailabilityCache>,
}

impl HttpWatermarkGateway {
    /// 创建新的 HTTP 网关
    pub fn new(config: HttpWatermarkGatewayConfig) -> Result<Self, GatewayError> {
        let api_base = config.base_url.trim().trim_end_matches('/').to_string();
        let base = Url::parse(&api_base)
            .map_err(|e| GatewayError::InvalidBaseUrl(format!("{}: {}", api_base, e)))?;
        if base.cannot_be_a_base() || !matches!(base.scheme(), "http" | "https") {
            return Err(GatewayError::InvalidBaseUrl(api_base));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GatewayError::Network(e.to_string()))?;

        Ok(Self {
            client,
            config,
            base,
            api_base,
            availability: AvailabilityCache::new().arc(),
        })
    }

    /// 使用默认配置创建网关
    pub fn with_default_config() -> Result<Self, GatewayError> {
        Self::new(HttpWatermarkGatewayConfig::default())
    }

    /// 替换可达性缓存
    pub fn with_availability(mut self, availability: Arc<AvailabilityCache>) -> Self {
        self.availability = availability;
        self
    }

    pub fn availability(&self) -> &Arc<AvailabilityCache> {
        &self.availability
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        // 构造时已排除 cannot-be-a-base 的 URL
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn health_url(&self) -> Url {
        self.endpoint(&["api", "health"])
    }

    fn operation_url(&self, kind: OperationKind) -> Url {
        let name = match kind {
            OperationKind::AddWatermark => "add",
            OperationKind::DetectWatermark => "detect",
            OperationKind::ScanWatermarks => "scan",
            OperationKind::ExtractWatermark => "extract",
            OperationKind::SuggestLength => "suggest-length",
        };
        self.endpoint(&["api", "watermark", name])
    }

    async fn probe_once(&self) -> HealthStatus {
        let url = self.health_url();
        let result = self
            .client
            .get(url.clone())
            .timeout(Duration::from_secs(self.config.health_timeout_secs))
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                let message = response
                    .json::<HealthReply>()
                    .await
                    .ok()
                    .and_then(|r| r.message)
                    .unwrap_or_else(|| "API服务器连接正常".to_string());
                HealthStatus {
                    reachable: true,
                    message,
                }
            }
            Ok(response) => {
                tracing::warn!(url = %url, status = %response.status(), "API server not available");
                HealthStatus {
                    reachable: false,
                    message: format!("API服务器状态异常: HTTP {}", response.status().as_u16()),
                }
            }
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "API server not available");
                HealthStatus {
                    reachable: false,
                    message: format!("API服务器连接失败: {}", e),
                }
            }
        }
    }

    /// 可达性闸门：已知不可达时不发出请求
    async fn ensure_available(&self, kind: OperationKind) -> Result<(), GatewayError> {
        if self.probe_health().await.reachable {
            return Ok(());
        }
        tracing::warn!(operation = %kind, "Skipping request, service unavailable");
        Err(GatewayError::ServiceUnavailable)
    }

    /// 发出一次 POST 请求并返回成功响应的原始字节
    async fn submit(&self, kind: OperationKind, form: Form) -> Result<Vec<u8>, GatewayError> {
        let url = self.operation_url(kind);
        tracing::debug!(operation = %kind, url = %url, "Sending watermark request");

        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(map_send_error)?;

        if !status.is_success() {
            tracing::warn!(operation = %kind, status = status.as_u16(), "Watermark request failed");
            return Err(GatewayError::Transport {
                status: status.as_u16(),
                body: wire::error_text(&body),
            });
        }

        tracing::info!(
            operation = %kind,
            status = status.as_u16(),
            body_size = body.len(),
            "Watermark request completed"
        );
        Ok(body.to_vec())
    }

    /// 通用流程：闸门 → 请求 → 解析 → 转换为领域结果
    async fn run_operation<T, F>(
        &self,
        kind: OperationKind,
        form: Form,
        into_outcome: F,
    ) -> Result<OperationResult, GatewayError>
    where
        T: DeserializeOwned,
        F: FnOnce(T) -> Result<OperationOutcome, GatewayError>,
    {
        self.ensure_available(kind).await?;
        let body = self.submit(kind, form).await?;

        match wire::decode::<T>(&body)? {
            Reply::Succeeded { message, data } => {
                Ok(OperationResult::succeeded(message, into_outcome(data)?))
            }
            Reply::Failed { message } => {
                tracing::info!(operation = %kind, message = %message, "Service reported failure");
                Ok(OperationResult::failed(message))
            }
        }
    }
}

fn map_send_error(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout
    } else if e.is_connect() {
        GatewayError::Network(format!("Cannot connect to watermark service: {}", e))
    } else {
        GatewayError::Network(e.to_string())
    }
}

fn image_part(image: &ImagePayload) -> Result<Part, GatewayError> {
    Part::bytes(image.bytes().to_vec())
        .file_name(image.file_name().to_string())
        .mime_str(image.content_type())
        .map_err(|e| GatewayError::Protocol(format!("Invalid content type: {}", e)))
}

#[async_trait]
impl WatermarkServicePort for HttpWatermarkGateway {
    async fn probe_health(&self) -> HealthStatus {
        self.availability.get_or_probe(|| self.probe_once()).await
    }

    async fn health_check(&self) -> HealthReport {
        let response = match self.client.get(self.health_url()).send().await {
            Ok(response) => response,
            Err(e) => return HealthReport::unhealthy(format!("API服务器连接失败: {}", e)),
        };

        let status = response.status();
        if !status.is_success() {
            return HealthReport::unhealthy(format!("API服务器连接失败: HTTP {}", status.as_u16()));
        }

        match response.json::<HealthReply>().await {
            Ok(reply) => {
                let status = reply.status.unwrap_or_else(|| "unknown".to_string());
                HealthReport {
                    success: reply.success.unwrap_or(status == "healthy"),
                    status,
                    message: reply.message.unwrap_or_default(),
                }
            }
            Err(e) => HealthReport::unhealthy(format!("API服务器连接失败: {}", e)),
        }
    }

    async fn add_watermark(
        &self,
        image: &ImagePayload,
        text: &str,
        method: &EmbeddingMethod,
    ) -> Result<OperationResult, GatewayError> {
        let form = Form::new()
            .part("image", image_part(image)?)
            .text("text", text.to_string())
            .text("method", method.to_string());

        self.run_operation(OperationKind::AddWatermark, form, |reply: AddReply| {
            Ok(reply.into())
        })
        .await
    }

    async fn detect_watermark(
        &self,
        image: &ImagePayload,
        expected_text: &str,
        method: &EmbeddingMethod,
    ) -> Result<OperationResult, GatewayError> {
        // 不发送 length，由服务端推断
        let form = Form::new()
            .part("image", image_part(image)?)
            .text("watermark", expected_text.to_string())
            .text("method", method.to_string());

        self.run_operation(OperationKind::DetectWatermark, form, |reply: DetectReply| {
            OperationOutcome::try_from(reply)
        })
        .await
    }

    async fn scan_watermarks(
        &self,
        image: &ImagePayload,
        method: &EmbeddingMethod,
        max_length: u32,
        verbose: bool,
    ) -> Result<OperationResult, GatewayError> {
        let form = Form::new()
            .part("image", image_part(image)?)
            .text("method", method.to_string())
            .text("max_length", max_length.to_string())
            .text("verbose", verbose.to_string());

        self.run_operation(OperationKind::ScanWatermarks, form, |reply: ScanReply| {
            Ok(reply.into())
        })
        .await
    }

    async fn extract_watermark(
        &self,
        image: &ImagePayload,
        method: &EmbeddingMethod,
        length: Option<NonZeroU32>,
    ) -> Result<OperationResult, GatewayError> {
        let mut form = Form::new()
            .part("image", image_part(image)?)
            .text("method", method.to_string());
        if let Some(length) = length {
            form = form.text("length", length.to_string());
        }

        self.run_operation(OperationKind::ExtractWatermark, form, |reply: ExtractReply| {
            Ok(reply.into())
        })
        .await
    }

    async fn suggest_length(&self, text: &str) -> Result<LengthSuggestion, GatewayError> {
        if !self.probe_health().await.reachable {
            tracing::warn!(text_len = text.len(), "Service unavailable, using local length fallback");
            return Ok(LengthSuggestion::fallback(text, SUGGEST_UNAVAILABLE_MESSAGE));
        }

        let form = Form::new().text("text", text.to_string());
        let body = self.submit(OperationKind::SuggestLength, form).await?;

        match wire::decode::<SuggestLengthReply>(&body)? {
            Reply::Succeeded { message, data } => Ok(LengthSuggestion {
                success: true,
                message,
                recommended_length: data.recommended_length,
                suggested_lengths: data.suggested_lengths,
                degraded: false,
            }),
            Reply::Failed { message } => Ok(LengthSuggestion::fallback(text, message)),
        }
    }

    fn download_reference(&self, filename: &str) -> Result<String, RequestError> {
        if filename.is_empty() {
            return Err(RequestError::EmptyFilename);
        }
        Ok(self.endpoint(&["api", "download", filename]).to_string())
    }

    fn api_base(&self) -> &str {
        &self.api_base
    }
}
