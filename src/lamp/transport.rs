//! 传输适配
//!
//! 连接状态机只依赖这里的两个抽象：把指令编码成设备字节的 [`CommandEncoder`]，
//! 以及负责收发字节的 [`LampTransport`]。超时由调用方 (连接状态机) 施加。

use async_trait::async_trait;
use bytes::Bytes;
use tracing::info;

use crate::error::Result;
use crate::light::LightCommand;
use super::address::DeviceAddress;

/// 台灯传输层
#[async_trait]
pub trait LampTransport: Send {
    /// 建立会话
    async fn connect(&mut self, address: &DeviceAddress) -> Result<()>;

    /// 写入已编码的指令，不做任何重试
    async fn send(&mut self, payload: Bytes) -> Result<()>;

    /// 链路是否仍然存活
    async fn is_connected(&mut self) -> bool;

    /// 释放会话，未连接时也必须安全
    async fn disconnect(&mut self) -> Result<()>;
}

/// 指令编码器 (设备相关)
pub trait CommandEncoder: Send + Sync {
    fn encode(&self, command: &LightCommand) -> Bytes;
}

/// 默认帧格式：`[起始符, 亮度, R, G, B]`
#[derive(Debug, Clone, Copy)]
pub struct FrameEncoder {
    header: u8,
}

impl FrameEncoder {
    pub const DEFAULT_HEADER: u8 = 0xAA;

    pub fn new(header: u8) -> Self {
        Self { header }
    }
}

impl Default for FrameEncoder {
    fn default() -> Self {
        Self::new(Self::DEFAULT_HEADER)
    }
}

impl CommandEncoder for FrameEncoder {
    fn encode(&self, command: &LightCommand) -> Bytes {
        let r = command.rgb;
        Bytes::from(vec![self.header, command.brightness, r.0, r.1, r.2])
    }
}

/// 只打日志的传输 (无硬件运行)
#[derive(Debug, Default)]
pub struct LogTransport {
    connected: Option<DeviceAddress>,
    frames_sent: u64,
}

impl LogTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }
}

#[async_trait]
impl LampTransport for LogTransport {
    async fn connect(&mut self, address: &DeviceAddress) -> Result<()> {
        info!("[dry-run] connect {}", address);
        self.connected = Some(*address);
        Ok(())
    }

    async fn send(&mut self, payload: Bytes) -> Result<()> {
        let hex: Vec<String> = payload.iter().map(|b| format!("{:02X}", b)).collect();
        info!("[dry-run] write {}", hex.join(" "));
        self.frames_sent += 1;
        Ok(())
    }

    async fn is_connected(&mut self) -> bool {
        self.connected.is_some()
    }

    async fn disconnect(&mut self) -> Result<()> {
        if let Some(address) = self.connected.take() {
            info!("[dry-run] disconnect {}", address);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::light::Rgb;

    #[test]
    fn test_frame_layout() {
        let encoder = FrameEncoder::default();
        let bytes = encoder.encode(&LightCommand::new(85, Rgb(255, 200, 100)));
        assert_eq!(&bytes[..], &[0xAA, 85, 255, 200, 100]);

        let encoder = FrameEncoder::new(0x55);
        let bytes = encoder.encode(&LightCommand::new(10, Rgb(1, 2, 3)));
        assert_eq!(&bytes[..], &[0x55, 10, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_log_transport() {
        let mut transport = LogTransport::new();
        let addr = DeviceAddress::new([1, 2, 3, 4, 5, 6]);

        assert!(!transport.is_connected().await);
        transport.connect(&addr).await.unwrap();
        assert!(transport.is_connected().await);
        transport.send(Bytes::from_static(&[0xAA, 1, 2, 3, 4])).await.unwrap();
        assert_eq!(transport.frames_sent(), 1);
        transport.disconnect().await.unwrap();
        assert!(!transport.is_connected().await);
    }
}
