//! 台灯连接状态机
//!
//! ```text
//! Disconnected --connect()--> Connecting --ok--> Connected
//! Connecting --失败/超时--> Backoff --到期--> Connecting
//! Connected --send 失败/超时/掉线--> Backoff
//! ```
//!
//! 所有 I/O 都有超时上限，任何失败路径都落到一个确定的状态。
//! 非 Connected 状态下 `send` 立即返回 `NotConnected`，不排队。
//! 单条指令从不在内部重试，重发由控制循环在下一个 tick 决定。
//! 退避的截止时刻从失败发生的那一刻算起，挂起的 I/O 不会占用退避时间。

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

use crate::error::{LampError, Result};
use crate::light::LightCommand;
use crate::utils::time::format_secs;
use crate::utils::{Clock, TokioClock};
use super::address::DeviceAddress;
use super::backoff::{Backoff, BackoffConfig};
use super::transport::{CommandEncoder, FrameEncoder, LampTransport};

/// 连接状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
    /// 等待到 `retry_at` 之后重连
    Backoff { retry_at: Instant },
}

impl LinkState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Backoff { .. } => "backoff",
        }
    }
}

/// 单个台灯的 BLE 会话
pub struct LampConnection {
    address: DeviceAddress,
    transport: Box<dyn LampTransport>,
    encoder: Box<dyn CommandEncoder>,
    clock: Arc<dyn Clock>,
    state: LinkState,
    backoff: Backoff,
    io_timeout: Duration,
    last_delay: Option<Duration>,
    connects: u64,
}

impl LampConnection {
    pub fn new(
        address: DeviceAddress,
        transport: Box<dyn LampTransport>,
        io_timeout: Duration,
        backoff: BackoffConfig,
    ) -> Self {
        Self {
            address,
            transport,
            encoder: Box::new(FrameEncoder::default()),
            clock: Arc::new(TokioClock),
            state: LinkState::Disconnected,
            backoff: Backoff::new(backoff),
            io_timeout,
            last_delay: None,
            connects: 0,
        }
    }

    /// 替换设备编码器
    pub fn with_encoder(mut self, encoder: Box<dyn CommandEncoder>) -> Self {
        self.encoder = encoder;
        self
    }

    /// 替换时钟，控制循环会注入自己的时钟
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == LinkState::Connected
    }

    pub fn address(&self) -> &DeviceAddress {
        &self.address
    }

    /// 最近一次进入 Backoff 时使用的延迟
    pub fn last_backoff_delay(&self) -> Option<Duration> {
        self.last_delay
    }

    /// 距离下次重连还剩多久
    pub fn retry_in(&self) -> Option<Duration> {
        match self.state {
            LinkState::Backoff { retry_at } => {
                Some(retry_at.saturating_duration_since(self.clock.now()))
            }
            _ => None,
        }
    }

    /// 成功建立连接的次数
    pub fn connects(&self) -> u64 {
        self.connects
    }

    /// 立即尝试连接 (已连接时直接返回)
    pub async fn connect(&mut self) -> Result<()> {
        if self.state == LinkState::Connected {
            return Ok(());
        }

        self.state = LinkState::Connecting;
        debug!("正在连接 {} (第 {} 次尝试)", self.address, self.backoff.attempts() + 1);

        match timeout(self.io_timeout, self.transport.connect(&self.address)).await {
            Ok(Ok(())) => {
                self.state = LinkState::Connected;
                self.backoff.reset();
                self.connects += 1;
                info!("台灯已连接: {}", self.address);
                Ok(())
            }
            Ok(Err(e)) => {
                self.release().await;
                self.enter_backoff(&e.to_string());
                Err(LampError::ConnectFailed(e.to_string()))
            }
            Err(_) => {
                self.release().await;
                self.enter_backoff("connect timed out");
                Err(LampError::ConnectTimeout(self.io_timeout))
            }
        }
    }

    /// 每个 tick 调用一次的维护
    ///
    /// - Disconnected / Connecting: 尝试连接
    /// - Backoff: 到期才尝试
    /// - Connected: 检查链路是否仍然存活
    pub async fn maintain(&mut self) -> Result<()> {
        match self.state {
            LinkState::Disconnected | LinkState::Connecting => self.connect().await,
            LinkState::Backoff { retry_at } if self.clock.now() >= retry_at => self.connect().await,
            LinkState::Backoff { .. } => Ok(()),
            LinkState::Connected => self.check_link().await,
        }
    }

    /// 发送一条指令
    pub async fn send(&mut self, command: &LightCommand) -> Result<()> {
        if self.state != LinkState::Connected {
            return Err(LampError::NotConnected);
        }

        let payload = self.encoder.encode(command);
        match timeout(self.io_timeout, self.transport.send(payload)).await {
            Ok(Ok(())) => {
                debug!("指令已发送: {}", command);
                Ok(())
            }
            Ok(Err(e)) => {
                self.release().await;
                self.enter_backoff(&e.to_string());
                Err(LampError::SendFailed(e.to_string()))
            }
            Err(_) => {
                self.release().await;
                self.enter_backoff("send timed out");
                Err(LampError::SendTimeout(self.io_timeout))
            }
        }
    }

    /// 释放会话，回到 Disconnected
    pub async fn close(&mut self) {
        if self.state != LinkState::Disconnected {
            info!("断开台灯连接: {}", self.address);
        }
        self.release().await;
        self.state = LinkState::Disconnected;
        self.backoff.reset();
    }

    async fn check_link(&mut self) -> Result<()> {
        let alive = matches!(
            timeout(self.io_timeout, self.transport.is_connected()).await,
            Ok(true)
        );
        if alive {
            return Ok(());
        }

        self.release().await;
        self.enter_backoff("link lost");
        Err(LampError::LinkLost)
    }

    /// 尽力断开传输层，避免留下半开的会话
    async fn release(&mut self) {
        match timeout(self.io_timeout, self.transport.disconnect()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("disconnect error ignored: {}", e),
            Err(_) => debug!("disconnect timed out"),
        }
    }

    /// 在失败 (含释放) 完成之后调用
    fn enter_backoff(&mut self, reason: &str) {
        let delay = self.backoff.next_delay();
        self.last_delay = Some(delay);
        self.state = LinkState::Backoff { retry_at: self.clock.now() + delay };
        warn!("台灯 {} 不可用 ({}), {} 后重连", self.address, reason, format_secs(delay));
    }
}
