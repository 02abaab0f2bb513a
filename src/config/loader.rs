//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. `WATERMARK_API_BASE_URL` 环境变量
//! 2. 其他环境变量
//! 3. 配置文件（watermark.toml）
//! 4. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::AppConfig;

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["watermark", "watermark.local"];

/// 单独覆盖服务地址的环境变量
const BASE_URL_ENV: &str = "WATERMARK_API_BASE_URL";

/// 加载应用配置
///
/// # 环境变量示例
/// - `WATERMARK_API_BASE_URL=http://watermark-api:8000`
/// - `WATERMARK_API__TIMEOUT_SECS=60`
/// - `WATERMARK_CONTROLLER__CONCURRENCY=reject_while_pending`
/// - `WATERMARK_LOG__LEVEL=debug`
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// # 参数
/// - `config_path` - 可选的配置文件路径，如果为 None 则使用默认搜索路径
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. 默认值（最低优先级）
    builder = builder
        .set_default("api.base_url", "http://localhost:8000")?
        .set_default("api.timeout_secs", 120)?
        .set_default("api.health_timeout_secs", 5)?
        .set_default("api.default_method", "dwtDct")?
        .set_default("controller.concurrency", "last_writer_wins")?
        .set_default("log.level", "info")?;

    // 2. 配置文件（如果存在）
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 3. 环境变量
    // 前缀: WATERMARK_
    // 层级分隔符: __ (双下划线)
    builder = builder.add_source(
        Environment::with_prefix("WATERMARK")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    // 4. 单独的服务地址变量（最高优先级）
    if let Ok(url) = std::env::var(BASE_URL_ENV) {
        if !url.trim().is_empty() {
            builder = builder.set_override("api.base_url", url)?;
        }
    }

    let config = builder.build()?;

    let app_config: AppConfig = config.try_deserialize().map_err(|e| {
        ConfigError::ParseError(format!("Failed to deserialize config: {}", e))
    })?;

    validate_config(&app_config)?;

    Ok(app_config)
}

/// 验证配置有效性
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    let base_url = config.api.base_url.trim();
    if base_url.is_empty() {
        return Err(ConfigError::ValidationError(
            "API base URL cannot be empty".to_string(),
        ));
    }
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::ValidationError(format!(
            "API base URL must start with http:// or https://: {}",
            base_url
        )));
    }

    if config.api.timeout_secs == 0 || config.api.health_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "Timeouts cannot be 0".to_string(),
        ));
    }

    if config.api.default_method.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "Default method cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志）
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Watermark Client Configuration ===");
    tracing::info!("API Base URL: {}", config.api.base_url);
    tracing::info!("API Timeout: {}s", config.api.timeout_secs);
    tracing::info!("Health Probe Timeout: {}s", config.api.health_timeout_secs);
    tracing::info!("Default Method: {}", config.api.default_method);
    tracing::info!("Concurrency Policy: {:?}", config.controller.concurrency);
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("======================================");
}
