//! 远端水印服务的 JSON 响应格式
//!
//! 所有响应至少包含 `{success: bool, message: string}`；`success = true` 时
//! 必须带上各操作特有的字段，否则视为协议错误。

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::application::ports::GatewayError;
use crate::domain::{Detection, OperationOutcome};

/// 错误消息截断长度
const MAX_ERROR_BODY_CHARS: usize = 200;

/// 解析后的响应
#[derive(Debug)]
pub(crate) enum Reply<T> {
    Succeeded { message: String, data: T },
    Failed { message: String },
}

/// 解析响应体：先校验公共字段，成功时再解析操作特有字段
pub(crate) fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<Reply<T>, GatewayError> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| GatewayError::Protocol(format!("Malformed JSON: {}", e)))?;

    let object = value
        .as_object()
        .ok_or_else(|| GatewayError::Protocol("Response is not a JSON object".to_string()))?;

    let success = object
        .get("success")
        .and_then(Value::as_bool)
        .ok_or_else(|| GatewayError::Protocol("Missing `success` field".to_string()))?;

    let message = object
        .get("message")
        .and_then(Value::as_str)
        .ok_or_else(|| GatewayError::Protocol("Missing `message` field".to_string()))?
        .to_string();

    if !success {
        return Ok(Reply::Failed { message });
    }

    let data = serde_json::from_value(value)
        .map_err(|e| GatewayError::Protocol(format!("Unexpected response shape: {}", e)))?;

    Ok(Reply::Succeeded { message, data })
}

/// 从错误响应体中提取可读消息
///
/// JSON 中字符串类型的 `message` / `detail` 优先；非 JSON 文本截断后原样返回。
pub(crate) fn error_text(body: &[u8]) -> String {
    if let Ok(value) = serde_json::from_slice::<Value>(body) {
        return ["message", "detail"]
            .iter()
            .find_map(|key| value.get(key).and_then(Value::as_str))
            .unwrap_or_default()
            .to_string();
    }

    let text = String::from_utf8_lossy(body);
    text.trim().chars().take(MAX_ERROR_BODY_CHARS).collect()
}

#[derive(Debug, Deserialize)]
pub(crate) struct AddReply {
    pub output_filename: String,
}

impl From<AddReply> for OperationOutcome {
    fn from(reply: AddReply) -> Self {
        OperationOutcome::Added {
            output_filename: reply.output_filename,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct DetectReply {
    pub has_watermark: bool,
    pub confidence: f64,
    #[serde(default)]
    pub decoded_content: Option<String>,
}

impl TryFrom<DetectReply> for OperationOutcome {
    type Error = GatewayError;

    fn try_from(reply: DetectReply) -> Result<Self, Self::Error> {
        if !(0.0..=1.0).contains(&reply.confidence) {
            return Err(GatewayError::Protocol(format!(
                "Confidence out of range: {}",
                reply.confidence
            )));
        }
        Ok(OperationOutcome::Detection(Detection {
            has_watermark: reply.has_watermark,
            confidence: reply.confidence,
            decoded_content: reply.decoded_content,
        }))
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ScanReply {
    pub found_watermarks: Vec<String>,
}

impl From<ScanReply> for OperationOutcome {
    fn from(reply: ScanReply) -> Self {
        OperationOutcome::Scan {
            found_watermarks: reply.found_watermarks,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExtractReply {
    #[serde(default, alias = "extracted_watermark", alias = "extracted_text")]
    pub watermark: Option<String>,
}

impl From<ExtractReply> for OperationOutcome {
    fn from(reply: ExtractReply) -> Self {
        OperationOutcome::Extraction {
            watermark: reply.watermark,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct SuggestLengthReply {
    pub recommended_length: u32,
    pub suggested_lengths: Vec<u32>,
}

/// 健康检查响应，字段都可能缺失
#[derive(Debug, Default, Deserialize)]
pub(crate) struct HealthReply {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}
