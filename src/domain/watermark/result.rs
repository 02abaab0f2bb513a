//! Watermark Context - Operation Results

use serde::Serialize;

/// 检测结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    pub has_watermark: bool,
    /// 置信度，范围 [0, 1]
    pub confidence: f64,
    pub decoded_content: Option<String>,
}

/// 长度建议
///
/// 服务不可达时的降级结果同样使用此结构：`success = false`、`degraded = true`，
/// `recommended_length` 为本地计算的文本字符数。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LengthSuggestion {
    pub success: bool,
    pub message: String,
    pub recommended_length: u32,
    pub suggested_lengths: Vec<u32>,
    pub degraded: bool,
}

impl LengthSuggestion {
    /// 本地降级结果：推荐长度等于文本的字符数
    pub fn fallback(text: &str, message: impl Into<String>) -> Self {
        let chars = u32::try_from(text.chars().count()).unwrap_or(u32::MAX);
        Self {
            success: false,
            message: message.into(),
            recommended_length: chars,
            suggested_lengths: Vec::new(),
            degraded: true,
        }
    }
}

/// 各操作特有的结果字段
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OperationOutcome {
    /// 嵌入成功，文件名用于构造下载地址
    Added { output_filename: String },
    Detection(Detection),
    /// 候选水印，保持服务端返回的顺序
    Scan { found_watermarks: Vec<String> },
    Extraction { watermark: Option<String> },
    LengthSuggestion(LengthSuggestion),
}

/// 一次操作的结构化结果
///
/// 不变量:
/// - `success == false` 时 `outcome` 必为 None，只保留 `message`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationResult {
    success: bool,
    message: String,
    outcome: Option<OperationOutcome>,
}

impl OperationResult {
    pub fn succeeded(message: impl Into<String>, outcome: OperationOutcome) -> Self {
        Self {
            success: true,
            message: message.into(),
            outcome: Some(outcome),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            outcome: None,
        }
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn outcome(&self) -> Option<&OperationOutcome> {
        self.outcome.as_ref()
    }

    pub fn output_filename(&self) -> Option<&str> {
        match &self.outcome {
            Some(OperationOutcome::Added { output_filename }) => Some(output_filename),
            _ => None,
        }
    }

    pub fn detection(&self) -> Option<&Detection> {
        match &self.outcome {
            Some(OperationOutcome::Detection(detection)) => Some(detection),
            _ => None,
        }
    }

    pub fn found_watermarks(&self) -> Option<&[String]> {
        match &self.outcome {
            Some(OperationOutcome::Scan { found_watermarks }) => Some(found_watermarks),
            _ => None,
        }
    }

    /// 面向用户的一行摘要
    pub fn summary(&self) -> String {
        match &self.outcome {
            None => self.message.clone(),
            Some(OperationOutcome::Added { .. }) => format!("✅ {}", self.message),
            Some(OperationOutcome::Detection(d)) if d.has_watermark => {
                format!("✅ 检测到水印! 置信度: {:.1}%", d.confidence * 100.0)
            }
            Some(OperationOutcome::Detection(_)) => "❌ 未检测到指定水印".to_string(),
            Some(OperationOutcome::Scan { found_watermarks }) if found_watermarks.is_empty() => {
                "🔍 扫描完成，未发现水印".to_string()
            }
            Some(OperationOutcome::Scan { found_watermarks }) => {
                format!("🔍 扫描完成，发现 {} 个可能的水印", found_watermarks.len())
            }
            Some(OperationOutcome::Extraction { watermark: Some(w) }) => {
                format!("📄 提取到水印: {}", w)
            }
            Some(OperationOutcome::Extraction { watermark: None }) => "📄 未提取到水印".to_string(),
            Some(OperationOutcome::LengthSuggestion(s)) => {
                format!("🧠 建议长度: {} 个字符", s.recommended_length)
            }
        }
    }
}
