//! Watermark Context
//!
//! 客户端视角的水印操作：请求（携带图片、文本与嵌入算法）以及服务端返回的结构化结果。
//! 真正的嵌入/检测算法运行在远端服务上。

mod errors;
mod request;
mod result;
mod value_objects;

pub use errors::RequestError;
pub use request::{OperationKind, OperationRequest, DEFAULT_SCAN_MAX_LENGTH};
pub use result::{Detection, LengthSuggestion, OperationOutcome, OperationResult};
pub use value_objects::{EmbeddingMethod, ImagePayload, DEFAULT_METHOD};
