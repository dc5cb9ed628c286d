//! 封顶指数退避

use std::time::Duration;

/// 退避参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffConfig {
    pub initial: Duration,
    pub max: Duration,
    pub multiplier: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(30),
            multiplier: 2,
        }
    }
}

/// 重连延迟序列：initial, initial*m, ... 直到 max
#[derive(Debug, Clone)]
pub struct Backoff {
    config: BackoffConfig,
    current: Duration,
    attempts: u32,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            current: config.initial.min(config.max),
            config,
            attempts: 0,
        }
    }

    /// 取下一次延迟并推进
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self
            .current
            .saturating_mul(self.config.multiplier.max(1))
            .min(self.config.max);
        self.attempts += 1;
        delay
    }

    /// 连接成功后回到初始值
    pub fn reset(&mut self) {
        self.current = self.config.initial.min(self.config.max);
        self.attempts = 0;
    }

    /// 自上次 reset 以来连续失败的次数
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn config(&self) -> &BackoffConfig {
        &self.config
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(BackoffConfig::default())
    }
}
