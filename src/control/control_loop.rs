//! 控制循环
//!
//! 整个系统唯一的驱动者。按固定周期 tick，与摄像头帧率无关：
//! 1. 取走样本槽里最新的样本，交给去抖器
//! 2. 维护台灯连接 (重连 / 链路检查)
//! 3. 稳定情绪变化、重连后补发、或到了重申间隔时，发送一次灯光指令
//!
//! 每个 tick 的错误都在本地消化，循环只会因停止信号退出。

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::emotion::{EmotionLabel, EmotionSmoother, MoodPatterns, SampleSlot, StableEmotion};
use crate::error::{LampError, Result};
use crate::lamp::{LampConnection, LinkState};
use crate::light::{LightCommand, LightPolicy};
use crate::utils::Clock;
use super::event::LoopEvent;

/// 循环配置
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// tick 周期
    pub tick: Duration,
    /// 距上次成功发送超过该间隔时重申当前指令，None 表示不重申
    pub reassert_interval: Option<Duration>,
    /// 退出前发送的灯光，None 表示保持现状
    pub farewell: Option<LightCommand>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(250),
            reassert_interval: Some(Duration::from_secs(30)),
            farewell: Some(LightCommand::farewell()),
        }
    }
}

/// 循环统计
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub ticks: u64,
    pub samples: u64,
    pub stable_changes: u64,
    pub commands_sent: u64,
    pub send_failures: u64,
    pub reconnects: u64,
    pub link_losses: u64,
}

/// 单个 tick 做了什么
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub sample_consumed: bool,
    pub stable_changed: Option<EmotionLabel>,
    pub sent: Option<LightCommand>,
    pub link: LinkState,
    /// 本 tick 内被消化的错误
    pub error: Option<LampError>,
}

pub struct ControlLoop {
    config: LoopConfig,
    slot: SampleSlot,
    smoother: EmotionSmoother,
    patterns: Option<MoodPatterns>,
    policy: LightPolicy,
    connection: LampConnection,
    clock: Arc<dyn Clock>,
    /// 当前应当显示的指令
    target: Option<LightCommand>,
    /// target 尚未成功写入台灯
    pending: bool,
    last_sent_at: Option<Instant>,
    stats: LoopStats,
    event_tx: Option<mpsc::UnboundedSender<LoopEvent>>,
}

impl ControlLoop {
    /// `clock` 同时注入到连接中，保证退避和重申在同一条时间线上
    pub fn new(
        config: LoopConfig,
        slot: SampleSlot,
        smoother: EmotionSmoother,
        policy: LightPolicy,
        connection: LampConnection,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            slot,
            smoother,
            patterns: None,
            policy,
            connection: connection.with_clock(Arc::clone(&clock)),
            clock,
            target: None,
            pending: false,
            last_sent_at: None,
            stats: LoopStats::default(),
            event_tx: None,
        }
    }

    /// 启用派生情绪检测
    pub fn with_patterns(mut self, patterns: MoodPatterns) -> Self {
        self.patterns = Some(patterns);
        self
    }

    /// 设置事件通道
    pub fn with_event_channel(mut self, tx: mpsc::UnboundedSender<LoopEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// 执行一次 tick
    pub async fn tick(&mut self) -> TickReport {
        let now = self.clock.now();
        self.stats.ticks += 1;

        let mut report = TickReport {
            sample_consumed: false,
            stable_changed: None,
            sent: None,
            link: self.connection.state(),
            error: None,
        };

        // 1. 样本 → 稳定情绪
        if let Some(sample) = self.slot.take() {
            report.sample_consumed = true;
            self.stats.samples += 1;

            let sample = match self.patterns.as_mut() {
                Some(patterns) => patterns.apply(sample),
                None => sample,
            };
            let previous = self.smoother.stable().map(|s| s.label);
            if let Some(stable) = self.smoother.observe(&sample) {
                let command = self.policy.map(&stable);
                self.stats.stable_changes += 1;
                report.stable_changed = Some(stable.label);
                self.target = Some(command);
                self.pending = true;
                self.emit(LoopEvent::StableChanged {
                    from: previous,
                    to: stable.label,
                    command,
                });
            }
        }

        // 2. 链路维护
        let before = self.connection.state();
        let link = self.connection.maintain().await;
        if let Err(e) = self.after_link_change(before, link) {
            report.error = Some(e);
        }

        // 3. 发送
        if let Some(command) = self.target {
            let reassert = !self.pending && self.reassert_due(now);
            if (self.pending || reassert) && self.connection.is_connected() {
                match self.connection.send(&command).await {
                    Ok(()) => {
                        self.pending = false;
                        self.last_sent_at = Some(self.clock.now());
                        self.stats.commands_sent += 1;
                        report.sent = Some(command);
                        if reassert {
                            debug!("重申灯光: {}", command);
                        } else {
                            info!("灯光设置: {}", command);
                        }
                        self.emit(LoopEvent::CommandSent { command, reassert });
                    }
                    Err(e) => {
                        self.stats.send_failures += 1;
                        warn!("控制指令失败: {}", e);
                        self.emit(LoopEvent::SendFailed { error: e.clone() });
                        self.emit_backoff();
                        report.error = Some(e);
                    }
                }
            }
        }

        report.link = self.connection.state();
        report
    }

    /// 按固定周期运行，直到停止信号置为 true (或发送端被丢弃)
    ///
    /// 停止信号在一个 tick 周期内生效；进行中的 tick 会被中断，随后释放连接。
    pub async fn run(mut self, mut stop: watch::Receiver<bool>) -> LoopStats {
        let mut ticker = interval(self.config.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("控制循环启动: tick {:?}, 台灯 {}", self.config.tick, self.connection.address());

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

            // 只有停止信号为 true 时才放弃进行中的 tick
            let stopped = {
                let tick = self.tick();
                tokio::pin!(tick);
                loop {
                    tokio::select! {
                        _ = &mut tick => break false,
                        changed = stop.changed() => {
                            if changed.is_err() || *stop.borrow() {
                                break true;
                            }
                        }
                    }
                }
            };
            if stopped {
                break;
            }
        }

        info!("收到退出信号");
        self.shutdown().await;
        info!("控制循环结束: {:?}", self.stats);
        self.stats
    }

    /// 发送告别灯光 (如已配置且已连接) 并释放连接
    pub async fn shutdown(&mut self) {
        if let Some(farewell) = self.config.farewell {
            if self.connection.is_connected() {
                match self.connection.send(&farewell).await {
                    Ok(()) => info!("告别灯光: {}", farewell),
                    Err(e) => warn!("告别灯光发送失败: {}", e),
                }
            }
        }
        self.connection.close().await;
    }

    fn reassert_due(&self, now: Instant) -> bool {
        match (self.config.reassert_interval, self.last_sent_at) {
            (Some(every), Some(last)) => now.saturating_duration_since(last) >= every,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    fn after_link_change(&mut self, before: LinkState, result: Result<()>) -> Result<()> {
        let after = self.connection.state();

        if before != LinkState::Connected && after == LinkState::Connected {
            let reconnect = self.connection.connects() > 1;
            if reconnect {
                self.stats.reconnects += 1;
            }
            // 台灯可能在断线期间丢失状态，重连后补发一次
            if self.target.is_some() {
                self.pending = true;
            }
            self.emit(LoopEvent::Connected { reconnect });
        }

        if let Err(e) = result {
            if e == LampError::LinkLost {
                self.stats.link_losses += 1;
                self.emit(LoopEvent::LinkLost { error: e.clone() });
            }
            self.emit_backoff();
            return Err(e);
        }
        Ok(())
    }

    fn emit_backoff(&self) {
        if let (LinkState::Backoff { .. }, Some(delay)) =
            (self.connection.state(), self.connection.last_backoff_delay())
        {
            self.emit(LoopEvent::BackoffScheduled { delay });
        }
    }

    pub fn stats(&self) -> &LoopStats {
        &self.stats
    }

    pub fn stable(&self) -> Option<StableEmotion> {
        self.smoother.stable()
    }

    /// 当前目标灯光
    pub fn target(&self) -> Option<LightCommand> {
        self.target
    }

    pub fn link_state(&self) -> LinkState {
        self.connection.state()
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    fn emit(&self, event: LoopEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event);
        }
    }
}
