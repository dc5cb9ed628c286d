//! 感知流水线
//!
//! 独立任务：按固定间隔取帧，每 `frame_skip` 帧识别一次，结果写入样本槽。
//! 单帧失败只记日志，不影响控制循环。

use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::emotion::SampleSlot;
use super::classifier::EmotionClassifier;
use super::source::FrameSource;

/// 流水线配置
#[derive(Debug, Clone)]
pub struct PerceptionConfig {
    /// 取帧间隔
    pub capture_interval: Duration,
    /// 每 N 帧识别一次
    pub frame_skip: u32,
}

impl Default for PerceptionConfig {
    fn default() -> Self {
        Self {
            capture_interval: Duration::from_millis(100),
            frame_skip: 5,
        }
    }
}

/// 流水线统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PerceptionStats {
    pub frames: u64,
    pub frame_errors: u64,
    pub classified: u64,
    pub unavailable: u64,
    /// 被新样本覆盖、未被控制循环消费的样本数
    pub overwritten: u64,
}

pub struct PerceptionPipeline<S, C> {
    config: PerceptionConfig,
    source: S,
    classifier: C,
    slot: SampleSlot,
    stats: PerceptionStats,
}

impl<S: FrameSource, C: EmotionClassifier> PerceptionPipeline<S, C> {
    pub fn new(config: PerceptionConfig, source: S, classifier: C, slot: SampleSlot) -> Self {
        Self {
            config,
            source,
            classifier,
            slot,
            stats: PerceptionStats::default(),
        }
    }

    /// 运行直到收到停止信号
    pub async fn run(mut self, mut stop: watch::Receiver<bool>) -> PerceptionStats {
        let mut ticker = interval(self.config.capture_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(
            "感知流水线启动: 间隔 {:?}, 每 {} 帧识别一次",
            self.config.capture_interval, self.config.frame_skip
        );

        loop {
            if *stop.borrow() {
                break;
            }
            tokio::select! {
                _ = ticker.tick() => {}
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                    continue;
                }
            }

            tokio::select! {
                _ = self.step() => {}
                _ = stop.changed() => break,
            }
        }

        info!("感知流水线停止: {:?}", self.stats);
        self.stats
    }

    /// 取一帧，必要时识别
    pub async fn step(&mut self) {
        let frame = match self.source.next_frame().await {
            Ok(frame) => frame,
            Err(e) => {
                if self.stats.frame_errors == 0 || self.stats.frame_errors % 50 == 0 {
                    warn!("无法读取摄像头帧: {}", e);
                }
                self.stats.frame_errors += 1;
                return;
            }
        };
        self.stats.frames += 1;

        if self.stats.frames % u64::from(self.config.frame_skip.max(1)) != 0 {
            return;
        }

        match self.classifier.classify(&frame).await {
            Ok(sample) => {
                self.stats.classified += 1;
                debug!("样本: {} ({:.2})", sample.label, sample.confidence);
                if self.slot.publish(sample) {
                    self.stats.overwritten += 1;
                }
            }
            Err(e) => {
                self.stats.unavailable += 1;
                debug!("本帧无样本: {}", e);
            }
        }
    }

    pub fn stats(&self) -> &PerceptionStats {
        &self.stats
    }
}
