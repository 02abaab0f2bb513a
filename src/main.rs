//! Watermark CLI - 远端水印服务的命令行客户端
//!
//! 加载配置、初始化日志，构造网关与操作控制器，执行一次操作并输出结算后的状态。

use std::num::NonZeroU32;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use watermark_client::application::{
    OperationController, OperationPhase, OperationState, WatermarkServicePort,
};
use watermark_client::config::{load_config, load_config_from_path, print_config, AppConfig};
use watermark_client::domain::{EmbeddingMethod, ImagePayload, OperationRequest};
use watermark_client::infrastructure::{HttpWatermarkGateway, HttpWatermarkGatewayConfig};

#[derive(Debug, Parser)]
#[command(name = "watermark-cli", version, about = "Client for the remote image watermarking service")]
struct Cli {
    /// 配置文件路径（默认搜索 watermark.toml）
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// 以 JSON 输出结果
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 探测服务是否可达
    Health,
    /// 调用健康检查接口并显示服务端报告
    Check,
    /// 嵌入水印
    Add {
        #[arg(long)]
        image: PathBuf,
        #[arg(long)]
        text: String,
        #[arg(long)]
        method: Option<String>,
    },
    /// 检测指定水印
    Detect {
        #[arg(long)]
        image: PathBuf,
        #[arg(long)]
        text: String,
        #[arg(long)]
        method: Option<String>,
    },
    /// 扫描所有可能的水印
    Scan {
        #[arg(long)]
        image: PathBuf,
        #[arg(long)]
        method: Option<String>,
        #[arg(long, default_value_t = watermark_client::domain::DEFAULT_SCAN_MAX_LENGTH)]
        max_length: u32,
        #[arg(long)]
        verbose: bool,
    },
    /// 提取水印
    Extract {
        #[arg(long)]
        image: PathBuf,
        #[arg(long)]
        method: Option<String>,
        #[arg(long)]
        length: Option<NonZeroU32>,
    },
    /// 获取水印长度建议
    SuggestLength {
        #[arg(long)]
        text: String,
    },
    /// 打印下载地址
    DownloadUrl { filename: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config_from_path(Some(path)),
        None => load_config(),
    }
    .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    init_tracing(&config);
    print_config(&config);

    let gateway_config = HttpWatermarkGatewayConfig::new(config.api.base_url.clone())
        .with_timeout(config.api.timeout_secs)
        .with_health_timeout(config.api.health_timeout_secs);
    let gateway: Arc<dyn WatermarkServicePort> = Arc::new(HttpWatermarkGateway::new(gateway_config)?);
    let controller =
        OperationController::new(gateway.clone()).with_policy(config.controller.concurrency);

    let default_method = EmbeddingMethod::new(config.api.default_method.clone())?;
    let method = |m: Option<String>| match m {
        Some(m) => EmbeddingMethod::new(m),
        None => Ok(default_method.clone()),
    };

    let request = match cli.command {
        Command::Health => {
            let status = gateway.probe_health().await;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                let mark = if status.reachable { "✅" } else { "❌" };
                println!("{} {}", mark, status.message);
            }
            return Ok(());
        }
        Command::Check => {
            let report = gateway.health_check().await;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else if report.is_healthy() {
                println!("✅ API connection successful! {}", report.message);
            } else {
                println!("❌ API status abnormal: {} {}", report.status, report.message);
            }
            return Ok(());
        }
        Command::SuggestLength { text } => {
            match controller.suggest_length(&text).await {
                Some(suggestion) if cli.json => {
                    println!("{}", serde_json::to_string_pretty(&suggestion)?)
                }
                Some(suggestion) => println!(
                    "🧠 Recommended length: {} characters ({})",
                    suggestion.recommended_length, suggestion.message
                ),
                None => println!("No length suggestion available"),
            }
            return Ok(());
        }
        Command::DownloadUrl { filename } => {
            println!("{}", gateway.download_reference(&filename)?);
            return Ok(());
        }
        Command::Add {
            image,
            text,
            method: m,
        } => OperationRequest::add(ImagePayload::from_path(image).await?, text)
            .with_method(method(m)?),
        Command::Detect {
            image,
            text,
            method: m,
        } => OperationRequest::detect(ImagePayload::from_path(image).await?, text)
            .with_method(method(m)?),
        Command::Scan {
            image,
            method: m,
            max_length,
            verbose,
        } => OperationRequest::ScanWatermarks {
            image: ImagePayload::from_path(image).await?,
            method: method(m)?,
            max_length,
            verbose,
        },
        Command::Extract {
            image,
            method: m,
            length,
        } => OperationRequest::extract(ImagePayload::from_path(image).await?, length)
            .with_method(method(m)?),
    };

    let state = controller.run(request).await?;
    report(&state, gateway.as_ref(), cli.json)?;

    if state.phase == OperationPhase::SettledError {
        std::process::exit(1);
    }
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let log_filter = format!(
        "{},watermark_client={}",
        config.log.level, config.log.level
    );
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// 输出结算状态；嵌入成功时附带下载地址
fn report(
    state: &OperationState,
    gateway: &dyn WatermarkServicePort,
    json: bool,
) -> anyhow::Result<()> {
    tracing::debug!(phase = state.phase.as_str(), "Operation settled");
    if json {
        println!("{}", serde_json::to_string_pretty(state)?);
        return Ok(());
    }

    if let Some(error) = &state.last_error {
        println!("❌ {}", error);
    }

    if let Some(result) = &state.last_result {
        println!("{}", result.summary());
        if let Some(found) = result.found_watermarks() {
            for (i, candidate) in found.iter().enumerate() {
                println!("  {}. {}", i + 1, candidate);
            }
        }
        if let Some(filename) = result.output_filename() {
            println!("⬇️  {}", gateway.download_reference(filename)?);
        }
    }

    Ok(())
}
