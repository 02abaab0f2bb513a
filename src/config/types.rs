//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;

use crate::application::ConcurrencyPolicy;
use crate::domain::DEFAULT_METHOD;

/// 应用主配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// 远端水印服务配置
    #[serde(default)]
    pub api: ApiConfig,

    /// 操作控制器配置
    #[serde(default)]
    pub controller: ControllerConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 远端水印服务配置
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// 服务基础 URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// 请求超时时间（秒）
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// 健康探测超时时间（秒）
    #[serde(default = "default_health_timeout")]
    pub health_timeout_secs: u64,

    /// 默认嵌入算法
    #[serde(default = "default_method")]
    pub default_method: String,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_timeout() -> u64 {
    120
}

fn default_health_timeout() -> u64 {
    5
}

fn default_method() -> String {
    DEFAULT_METHOD.to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
            health_timeout_secs: default_health_timeout(),
            default_method: default_method(),
        }
    }
}

/// 操作控制器配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ControllerConfig {
    /// 并发调用策略: last_writer_wins / reject_while_pending
    #[serde(default)]
    pub concurrency: ConcurrencyPolicy,
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}
