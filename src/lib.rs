//! 情绪感应台灯核心库
//!
//! 核心机制：感知 → 执行 控制循环
//! - 摄像头帧 → 外部识别服务 → 原始情绪样本
//! - 原始样本 → 去抖 → 稳定情绪
//! - 稳定情绪 → 调色板 → 灯光指令
//! - 灯光指令 → 带退避重连的 BLE 会话 → 台灯

pub mod config;
pub mod control;
pub mod emotion;
pub mod error;
pub mod lamp;
pub mod light;
pub mod perception;
pub mod utils;

// Re-exports - 控制循环
pub use control::{ControlLoop, LoopConfig, LoopEvent, LoopStats, TickReport};

// Re-exports - 情绪
pub use emotion::{
    EmotionLabel, EmotionSample, EmotionSmoother, MoodPatterns, SampleSlot, SmootherConfig,
    StableEmotion,
};

// Re-exports - 灯光与台灯
pub use light::{LightCommand, LightPolicy, Rgb};
pub use lamp::{
    Backoff, BackoffConfig, CommandEncoder, DeviceAddress, FrameEncoder, LampConnection,
    LampTransport, LinkState, LogTransport, MockTransport,
};

// Re-exports - 感知
pub use perception::{
    EmotionClassifier, Frame, FrameSource, HttpClassifier, HttpSnapshotSource, PerceptionPipeline,
};

pub use config::AppConfig;
pub use error::{LampError, Result};
pub use utils::{Clock, ManualClock, TokioClock};
