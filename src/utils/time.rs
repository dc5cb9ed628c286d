//! 时间工具
//!
//! 去抖器只接收外部传入的时刻；控制循环和台灯连接通过 [`Clock`] 注入时钟。

use std::sync::Arc;
use std::time::Duration;
use parking_lot::Mutex;
use tokio::time::Instant;

/// 单调时钟
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// 真实时钟 (tokio 单调时间，测试中可被 pause)
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// 手动推进的时钟，用于测试
#[derive(Debug, Clone)]
pub struct ManualClock {
    base: Instant,
    offset: Arc<Mutex<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    /// 向前推进
    pub fn advance(&self, by: Duration) {
        *self.offset.lock() += by;
    }

    /// 从创建起经过的时间
    pub fn elapsed(&self) -> Duration {
        *self.offset.lock()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + *self.offset.lock()
    }
}

/// 毫秒转 Duration
pub fn millis(ms: u64) -> Duration {
    Duration::from_millis(ms)
}

/// 格式化时长为 `S.mmm s`，日志用
pub fn format_secs(d: Duration) -> String {
    format!("{}.{:03}s", d.as_secs(), d.subsec_millis())
}
