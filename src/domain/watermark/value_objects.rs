//! Watermark Context - Value Objects

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::RequestError;

/// 服务端默认的嵌入算法
pub const DEFAULT_METHOD: &str = "dwtDct";

/// 嵌入算法标识
///
/// 对客户端是不透明字符串，由服务端解释。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmbeddingMethod(String);

impl EmbeddingMethod {
    pub fn new(method: impl Into<String>) -> Result<Self, RequestError> {
        let method = method.into();
        if method.trim().is_empty() {
            return Err(RequestError::EmptyMethod);
        }
        Ok(Self(method))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EmbeddingMethod {
    fn default() -> Self {
        Self(DEFAULT_METHOD.to_string())
    }
}

impl std::fmt::Display for EmbeddingMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 上传的图片
///
/// 不变量:
/// - bytes 非空（通过 `new` / `from_path` 构造时保证）
#[derive(Clone, PartialEq, Eq)]
pub struct ImagePayload {
    file_name: String,
    content_type: String,
    bytes: Vec<u8>,
}

impl ImagePayload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, RequestError> {
        if bytes.is_empty() {
            return Err(RequestError::EmptyImage);
        }
        let file_name = file_name.into();
        let content_type = guess_content_type(&file_name).to_string();
        Ok(Self {
            file_name,
            content_type,
            bytes,
        })
    }

    /// 从磁盘读取图片
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, RequestError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| RequestError::UnreadableImage(format!("{}: {}", path.display(), e)))?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("image")
            .to_string();
        Self::new(file_name, bytes)
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

// 图片内容不进日志
impl std::fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImagePayload")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

fn guess_content_type(file_name: &str) -> &'static str {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("bmp") => "image/bmp",
        Some("webp") => "image/webp",
        Some("tif") | Some("tiff") => "image/tiff",
        Some("gif") => "image/gif",
        _ => "application/octet-stream",
    }
}
