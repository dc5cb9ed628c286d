//! 情绪去抖
//!
//! 把逐帧的原始样本聚合成稳定情绪。新标签必须连续出现至少 `min_dwell`
//! (按样本时间戳计算，与帧率无关) 才会替换当前稳定情绪。
//!
//! 规则：
//! - 置信度低于阈值的样本被完全忽略，既不延长也不打断当前连续段。
//! - 两个高置信度样本之间的间隔超过 `signal_timeout` 时，连续段从新样本重新开始，
//!   一个连续段不能跨越信号中断。
//! - 信号中断期间稳定情绪保持不变 (hold last)，不会回落到 neutral。

use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use super::sample::{EmotionLabel, EmotionSample};

/// 当前生效的稳定情绪
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StableEmotion {
    pub label: EmotionLabel,
    /// 最近一次变化的时刻
    pub since: Instant,
}

/// 去抖配置
#[derive(Debug, Clone)]
pub struct SmootherConfig {
    /// 最低置信度 (0-1)
    pub confidence_threshold: f32,
    /// 最短驻留时间
    pub min_dwell: Duration,
    /// 高置信度样本之间允许的最大间隔
    pub signal_timeout: Duration,
}

impl Default for SmootherConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.2,
            min_dwell: Duration::from_millis(1500),
            signal_timeout: Duration::from_secs(5),
        }
    }
}

/// 正在累积的连续段
#[derive(Debug, Clone, Copy)]
struct Run {
    label: EmotionLabel,
    started: Instant,
    last_seen: Instant,
}

/// 情绪去抖器
pub struct EmotionSmoother {
    config: SmootherConfig,
    stable: Option<StableEmotion>,
    run: Option<Run>,
    last_confident: Option<Instant>,
    ignored: u64,
}

impl EmotionSmoother {
    pub fn new(config: SmootherConfig) -> Self {
        Self {
            config,
            stable: None,
            run: None,
            last_confident: None,
            ignored: 0,
        }
    }

    /// 输入一个原始样本
    ///
    /// 只有稳定情绪发生变化时返回 `Some`。
    pub fn observe(&mut self, sample: &EmotionSample) -> Option<StableEmotion> {
        if sample.confidence < self.config.confidence_threshold {
            self.ignored += 1;
            debug!(
                "忽略低置信度样本: {} ({:.2} < {:.2})",
                sample.label, sample.confidence, self.config.confidence_threshold
            );
            return None;
        }

        let ts = sample.timestamp;
        let signal_timeout = self.config.signal_timeout;

        match self.run.as_mut() {
            Some(run)
                if run.label == sample.label
                    && ts.saturating_duration_since(run.last_seen) <= signal_timeout =>
            {
                run.last_seen = ts;
            }
            _ => {
                self.run = Some(Run {
                    label: sample.label,
                    started: ts,
                    last_seen: ts,
                });
            }
        }
        self.last_confident = Some(ts);

        let run = self.run?;
        if self.stable.map(|s| s.label) == Some(run.label) {
            return None;
        }

        let dwell = ts.saturating_duration_since(run.started);
        if dwell < self.config.min_dwell {
            return None;
        }

        let previous = self.stable.map(|s| s.label);
        let stable = StableEmotion {
            label: run.label,
            since: ts,
        };
        self.stable = Some(stable);

        match previous {
            Some(prev) => info!("稳定情绪变化: {} -> {} (驻留 {:?})", prev, stable.label, dwell),
            None => info!("稳定情绪确立: {} (驻留 {:?})", stable.label, dwell),
        }

        Some(stable)
    }

    /// 当前稳定情绪
    pub fn stable(&self) -> Option<StableEmotion> {
        self.stable
    }

    /// 正在累积但尚未生效的标签及其已驻留时间
    pub fn pending(&self) -> Option<(EmotionLabel, Duration)> {
        let run = self.run?;
        if self.stable.map(|s| s.label) == Some(run.label) {
            return None;
        }
        Some((run.label, run.last_seen.saturating_duration_since(run.started)))
    }

    /// 超过 `signal_timeout` 没有收到高置信度样本
    pub fn is_signal_lost(&self, now: Instant) -> bool {
        match self.last_confident {
            Some(t) => now.saturating_duration_since(t) > self.config.signal_timeout,
            None => true,
        }
    }

    /// 被忽略的低置信度样本数
    pub fn ignored(&self) -> u64 {
        self.ignored
    }

    pub fn config(&self) -> &SmootherConfig {
        &self.config
    }

    pub fn reset(&mut self) {
        self.stable = None;
        self.run = None;
        self.last_confident = None;
        self.ignored = 0;
    }
}

impl Default for EmotionSmoother {
    fn default() -> Self {
        Self::new(SmootherConfig::default())
    }
}
