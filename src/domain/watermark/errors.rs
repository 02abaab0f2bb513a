//! Watermark Context - Errors

use thiserror::Error;

/// 调用方契约违反
///
/// 请求在发出之前就不合法（程序错误，而非运行时状况），同步拒绝，不改变任何状态。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("图片数据不能为空")]
    EmptyImage,

    #[error("水印文本不能为空")]
    EmptyText,

    #[error("嵌入算法不能为空")]
    EmptyMethod,

    #[error("文件名不能为空")]
    EmptyFilename,

    #[error("无法读取图片文件: {0}")]
    UnreadableImage(String),

    #[error("已有操作正在进行中: {0}")]
    OperationInFlight(String),
}
