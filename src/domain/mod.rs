//! Domain Layer - 领域层
//!
//! 只有一个限界上下文:
//! - Watermark Context: 水印操作请求与结果

pub mod watermark;

pub use watermark::{
    Detection, EmbeddingMethod, ImagePayload, LengthSuggestion, OperationKind, OperationOutcome,
    OperationRequest, OperationResult, RequestError, DEFAULT_METHOD, DEFAULT_SCAN_MAX_LENGTH,
};
