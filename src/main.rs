//! 情绪感应台灯
//!
//! 摄像头 → 情绪识别 → 去抖 → 调色板 → BLE 台灯

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info, warn};

use mood_lamp::{
    AppConfig, Clock, ControlLoop, EmotionSmoother, HttpClassifier, HttpSnapshotSource,
    LampConnection, LampTransport, LogTransport, MoodPatterns, PerceptionPipeline, SampleSlot,
    TokioClock,
};

#[derive(Parser, Debug)]
#[command(name = "mood-lamp", version, about = "Drive a BLE lamp from live facial emotion")]
struct Cli {
    /// JSON 配置文件
    #[arg(long)]
    config: Option<PathBuf>,

    /// 台灯 BLE 地址 (AA:BB:CC:DD:EE:FF)
    #[arg(long)]
    address: Option<String>,

    /// 最低识别置信度 (0-1)
    #[arg(long)]
    confidence_threshold: Option<f32>,

    /// 新情绪生效前的驻留时间 (毫秒)
    #[arg(long)]
    min_dwell_ms: Option<u64>,

    /// 控制循环周期 (毫秒)
    #[arg(long)]
    tick_ms: Option<u64>,

    /// 初始重连延迟 (毫秒)
    #[arg(long)]
    backoff_initial_ms: Option<u64>,

    /// 最大重连延迟 (毫秒)
    #[arg(long)]
    backoff_max_ms: Option<u64>,

    /// 摄像头快照地址
    #[arg(long)]
    camera_url: Option<String>,

    /// 情绪识别服务地址
    #[arg(long)]
    classifier_url: Option<String>,

    /// 启用 focused / tired 派生情绪
    #[arg(long)]
    detect_patterns: bool,

    /// 不连接蓝牙，只打印指令
    #[arg(long)]
    dry_run: bool,
}

impl Cli {
    /// 文件配置 + 命令行覆盖
    fn resolve(&self) -> anyhow::Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::load(path)?,
            None => AppConfig::default(),
        };

        if let Some(address) = &self.address {
            config.device.address = Some(address.clone());
        }
        if let Some(v) = self.confidence_threshold {
            config.smoothing.confidence_threshold = v;
        }
        if let Some(v) = self.min_dwell_ms {
            config.smoothing.min_dwell_ms = v;
        }
        if let Some(v) = self.tick_ms {
            config.control.tick_ms = v;
        }
        if let Some(v) = self.backoff_initial_ms {
            config.backoff.initial_ms = v;
        }
        if let Some(v) = self.backoff_max_ms {
            config.backoff.max_ms = v;
        }
        if let Some(url) = &self.camera_url {
            config.perception.camera_url = url.clone();
        }
        if let Some(url) = &self.classifier_url {
            config.perception.classifier_url = url.clone();
        }
        if self.detect_patterns {
            config.smoothing.detect_patterns = true;
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(feature = "ble")]
async fn lamp_transport(config: &AppConfig, dry_run: bool) -> anyhow::Result<Box<dyn LampTransport>> {
    if dry_run {
        return Ok(Box::new(LogTransport::new()));
    }
    let transport = mood_lamp::lamp::BleTransport::new(config.ble_settings()?).await?;
    Ok(Box::new(transport))
}

#[cfg(not(feature = "ble"))]
async fn lamp_transport(_config: &AppConfig, dry_run: bool) -> anyhow::Result<Box<dyn LampTransport>> {
    if dry_run {
        return Ok(Box::new(LogTransport::new()));
    }
    anyhow::bail!("built without BLE support: rebuild with `--features ble` or pass --dry-run")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mood_lamp=info".into()),
        )
        .init();

    info!("mood-lamp v{} starting", env!("CARGO_PKG_VERSION"));

    let config = cli.resolve().context("invalid configuration")?;
    let address = config.device_address()?;
    let clock: Arc<dyn Clock> = Arc::new(TokioClock);
    let request_timeout = mood_lamp::utils::time::millis(config.perception.request_timeout_ms);

    // 感知侧
    let mut source = HttpSnapshotSource::new(&config.perception.camera_url, request_timeout, clock.clone())?;
    source.probe().await.context("camera unavailable")?;
    let classifier = HttpClassifier::new(&config.perception.classifier_url, request_timeout)?;
    if !classifier.health().await {
        warn!("情绪识别服务暂不可用，将在运行中重试: {}", classifier.base_url());
    }

    // 执行侧
    let transport = lamp_transport(&config, cli.dry_run).await?;
    let connection = LampConnection::new(address, transport, config.io_timeout(), config.backoff_config())
        .with_encoder(Box::new(config.encoder()));

    let slot = SampleSlot::new();
    let mut control = ControlLoop::new(
        config.loop_config(),
        slot.clone(),
        EmotionSmoother::new(config.smoother_config()),
        config.policy(),
        connection,
        clock.clone(),
    );
    if config.smoothing.detect_patterns {
        control = control.with_patterns(MoodPatterns::new(config.smoothing.confidence_threshold));
    }

    let (stop_tx, stop_rx) = watch::channel(false);
    let perception = tokio::spawn(
        PerceptionPipeline::new(config.perception_config(), source, classifier, slot).run(stop_rx.clone()),
    );

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("收到 Ctrl-C，正在退出");
                let _ = stop_tx.send(true);
            }
            Err(e) => {
                error!("无法监听 Ctrl-C: {}", e);
                // 发送端一旦丢弃循环就会停止
                std::future::pending::<()>().await;
            }
        }
    });

    info!("系统初始化完成，开始情绪感应");
    let stats = control.run(stop_rx).await;

    match perception.await {
        Ok(p) => info!("感知统计: {:?}", p),
        Err(e) => warn!("感知任务异常结束: {}", e),
    }
    info!("程序结束: {:?}", stats);
    Ok(())
}
