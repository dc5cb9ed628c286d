//! 内存中的传输替身
//!
//! 克隆共享同一份状态，测试可以一边把它交给连接状态机，一边注入故障、检查写入。

use std::sync::Arc;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::error::{LampError, Result};
use super::address::DeviceAddress;
use super::transport::LampTransport;

#[derive(Debug, Default)]
struct MockState {
    link_up: bool,
    connect_failures: u32,
    send_failures: u32,
    hang: bool,
    connect_attempts: u32,
    connect_log: Vec<Instant>,
    disconnects: u32,
    sent: Vec<Bytes>,
}

#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// 接下来 `n` 次 connect 失败
    pub fn fail_connects(&self, n: u32) {
        self.state.lock().connect_failures = n;
    }

    /// 接下来 `n` 次 send 失败并断开链路
    pub fn fail_sends(&self, n: u32) {
        self.state.lock().send_failures = n;
    }

    /// 模拟设备掉线
    pub fn drop_link(&self) {
        self.state.lock().link_up = false;
    }

    /// 让所有 I/O 永远挂起
    pub fn set_hang(&self, hang: bool) {
        self.state.lock().hang = hang;
    }

    pub fn sent(&self) -> Vec<Bytes> {
        self.state.lock().sent.clone()
    }

    pub fn connect_attempts(&self) -> u32 {
        self.state.lock().connect_attempts
    }

    /// 每次 connect 开始的时刻
    pub fn connect_log(&self) -> Vec<Instant> {
        self.state.lock().connect_log.clone()
    }

    pub fn disconnects(&self) -> u32 {
        self.state.lock().disconnects
    }

    pub fn is_link_up(&self) -> bool {
        self.state.lock().link_up
    }

    async fn maybe_hang(&self) {
        let hang = self.state.lock().hang;
        if hang {
            std::future::pending::<()>().await;
        }
    }
}

#[async_trait]
impl LampTransport for MockTransport {
    async fn connect(&mut self, address: &DeviceAddress) -> Result<()> {
        {
            let mut state = self.state.lock();
            state.connect_attempts += 1;
            state.connect_log.push(Instant::now());
        }
        self.maybe_hang().await;

        let mut state = self.state.lock();
        if state.connect_failures > 0 {
            state.connect_failures -= 1;
            return Err(LampError::Transport(format!("{} not found", address)));
        }
        state.link_up = true;
        Ok(())
    }

    async fn send(&mut self, payload: Bytes) -> Result<()> {
        self.maybe_hang().await;

        let mut state = self.state.lock();
        if !state.link_up {
            return Err(LampError::Transport("link down".into()));
        }
        if state.send_failures > 0 {
            state.send_failures -= 1;
            state.link_up = false;
            return Err(LampError::Transport("write failed".into()));
        }
        state.sent.push(payload);
        Ok(())
    }

    async fn is_connected(&mut self) -> bool {
        self.maybe_hang().await;
        self.state.lock().link_up
    }

    async fn disconnect(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        state.disconnects += 1;
        state.link_up = false;
        Ok(())
    }
}
