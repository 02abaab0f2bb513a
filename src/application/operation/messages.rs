//! 失败类型到用户可读消息的渲染

use crate::application::ports::GatewayError;

pub const UNAVAILABLE_MESSAGE: &str = "🔌 API服务器暂时不可用，请稍后再试或联系管理员";
pub const CONNECTION_MESSAGE: &str = "🔌 API服务器连接失败，请检查服务器是否启动";
pub const TIMEOUT_MESSAGE: &str = "⏱️ 请求超时，请稍后再试";
pub const VALIDATION_MESSAGE: &str = "📋 请求参数错误，请检查表单数据";
pub const PROTOCOL_MESSAGE: &str = "⚠️ 服务器响应格式错误";
pub const GENERIC_FAILURE_MESSAGE: &str = "操作失败";

/// 渲染网关失败
///
/// 先看结构化的状态码，只有没有状态码的失败才退回到消息文本匹配。
pub fn render_failure(err: &GatewayError) -> String {
    match err {
        GatewayError::ServiceUnavailable => UNAVAILABLE_MESSAGE.to_string(),
        GatewayError::Timeout => TIMEOUT_MESSAGE.to_string(),
        GatewayError::Network(detail) => render_unstructured(detail),
        GatewayError::Transport { status: 422, body } => with_detail(VALIDATION_MESSAGE, body),
        GatewayError::Transport { status, body } if !body.is_empty() => {
            format!("{} (HTTP {})", body, status)
        }
        GatewayError::Transport { status, .. } => render_status(*status),
        GatewayError::Protocol(detail) => with_detail(PROTOCOL_MESSAGE, detail),
        GatewayError::InvalidBaseUrl(url) => format!("⚙️ API服务器地址配置错误: {}", url),
    }
}

/// 没有状态码时按消息文本分类
fn render_unstructured(detail: &str) -> String {
    if detail.contains("422") {
        VALIDATION_MESSAGE.to_string()
    } else {
        CONNECTION_MESSAGE.to_string()
    }
}

fn render_status(status: u16) -> String {
    match status {
        400 => format!("📋 请求无效 (HTTP {})", status),
        404 => format!("❓ 接口不存在 (HTTP {})", status),
        413 => format!("📦 图片文件过大 (HTTP {})", status),
        500..=599 => format!("🔥 服务器内部错误 (HTTP {})", status),
        _ => format!("请求失败 (HTTP {})", status),
    }
}

fn with_detail(base: &str, detail: &str) -> String {
    if detail.trim().is_empty() {
        base.to_string()
    } else {
        format!("{}: {}", base, detail)
    }
}
