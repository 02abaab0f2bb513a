//! Watermark Context - Operation Requests

use serde::Serialize;
use std::num::NonZeroU32;

use super::{EmbeddingMethod, ImagePayload, RequestError};

/// 扫描时默认的最大水印长度
pub const DEFAULT_SCAN_MAX_LENGTH: u32 = 512;

/// 操作类型（用于日志与消息渲染）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    AddWatermark,
    DetectWatermark,
    ScanWatermarks,
    ExtractWatermark,
    SuggestLength,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::AddWatermark => "add",
            OperationKind::DetectWatermark => "detect",
            OperationKind::ScanWatermarks => "scan",
            OperationKind::ExtractWatermark => "extract",
            OperationKind::SuggestLength => "suggest_length",
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一次用户触发的水印操作
#[derive(Debug, Clone)]
pub enum OperationRequest {
    /// 嵌入水印
    AddWatermark {
        image: ImagePayload,
        text: String,
        method: EmbeddingMethod,
    },
    /// 检测指定水印（长度由服务端推断）
    DetectWatermark {
        image: ImagePayload,
        expected_text: String,
        method: EmbeddingMethod,
    },
    /// 扫描图片中所有可能的水印
    ScanWatermarks {
        image: ImagePayload,
        method: EmbeddingMethod,
        max_length: u32,
        verbose: bool,
    },
    /// 提取水印；未给出长度时由服务端推断
    ExtractWatermark {
        image: ImagePayload,
        method: EmbeddingMethod,
        length: Option<NonZeroU32>,
    },
    /// 获取水印长度建议
    SuggestLength { text: String },
}

impl OperationRequest {
    pub fn add(image: ImagePayload, text: impl Into<String>) -> Self {
        Self::AddWatermark {
            image,
            text: text.into(),
            method: EmbeddingMethod::default(),
        }
    }

    pub fn detect(image: ImagePayload, expected_text: impl Into<String>) -> Self {
        Self::DetectWatermark {
            image,
            expected_text: expected_text.into(),
            method: EmbeddingMethod::default(),
        }
    }

    pub fn scan(image: ImagePayload) -> Self {
        Self::ScanWatermarks {
            image,
            method: EmbeddingMethod::default(),
            max_length: DEFAULT_SCAN_MAX_LENGTH,
            verbose: false,
        }
    }

    pub fn extract(image: ImagePayload, length: Option<NonZeroU32>) -> Self {
        Self::ExtractWatermark {
            image,
            method: EmbeddingMethod::default(),
            length,
        }
    }

    pub fn suggest_length(text: impl Into<String>) -> Self {
        Self::SuggestLength { text: text.into() }
    }

    /// 替换嵌入算法（SuggestLength 没有算法参数，保持不变）
    pub fn with_method(mut self, new_method: EmbeddingMethod) -> Self {
        match &mut self {
            Self::AddWatermark { method, .. }
            | Self::DetectWatermark { method, .. }
            | Self::ScanWatermarks { method, .. }
            | Self::ExtractWatermark { method, .. } => *method = new_method,
            Self::SuggestLength { .. } => {}
        }
        self
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            Self::AddWatermark { .. } => OperationKind::AddWatermark,
            Self::DetectWatermark { .. } => OperationKind::DetectWatermark,
            Self::ScanWatermarks { .. } => OperationKind::ScanWatermarks,
            Self::ExtractWatermark { .. } => OperationKind::ExtractWatermark,
            Self::SuggestLength { .. } => OperationKind::SuggestLength,
        }
    }

    pub fn image(&self) -> Option<&ImagePayload> {
        match self {
            Self::AddWatermark { image, .. }
            | Self::DetectWatermark { image, .. }
            | Self::ScanWatermarks { image, .. }
            | Self::ExtractWatermark { image, .. } => Some(image),
            Self::SuggestLength { .. } => None,
        }
    }

    /// 检查必填字段
    ///
    /// - 图片（除 SuggestLength 外都需要）必须非空
    /// - 文本（Add / Detect / SuggestLength）去掉首尾空白后必须非空
    pub fn validate(&self) -> Result<(), RequestError> {
        if let Some(image) = self.image() {
            if image.is_empty() {
                return Err(RequestError::EmptyImage);
            }
        }

        let text = match self {
            Self::AddWatermark { text, .. } => Some(text),
            Self::DetectWatermark { expected_text, .. } => Some(expected_text),
            Self::SuggestLength { text } => Some(text),
            Self::ScanWatermarks { .. } | Self::ExtractWatermark { .. } => None,
        };
        if text.is_some_and(|t| t.trim().is_empty()) {
            return Err(RequestError::EmptyText);
        }

        Ok(())
    }
}
