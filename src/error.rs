//! 错误类型
//!
//! 每个 tick 内的错误都在控制循环里就地恢复，只有配置错误是致命的。

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LampError {
    /// 本次没有可用的识别结果 (跳过该 tick)
    #[error("classification unavailable: {0}")]
    ClassificationUnavailable(String),
    #[error("camera unavailable: {0}")]
    CameraUnavailable(String),
    /// 连接不在 Connected 状态，立即失败不排队
    #[error("lamp not connected")]
    NotConnected,
    #[error("send failed: {0}")]
    SendFailed(String),
    #[error("send timed out after {0:?}")]
    SendTimeout(Duration),
    /// 健康检查发现链路已断开
    #[error("link lost")]
    LinkLost,
    #[error("connect failed: {0}")]
    ConnectFailed(String),
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),
    /// 传输层原始错误，由连接状态机映射为上面的变体
    #[error("transport error: {0}")]
    Transport(String),
    #[error("invalid device configuration: {0}")]
    FatalDeviceConfig(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl LampError {
    /// 只有启动期配置错误会终止进程
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::FatalDeviceConfig(_) | Self::Config(_))
    }
}

pub type Result<T> = std::result::Result<T, LampError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_config_errors_are_fatal() {
        assert!(LampError::FatalDeviceConfig("bad mac".into()).is_fatal());
        assert!(LampError::Config("tick".into()).is_fatal());
        assert!(!LampError::NotConnected.is_fatal());
        assert!(!LampError::SendTimeout(Duration::from_secs(3)).is_fatal());
        assert!(!LampError::ClassificationUnavailable("no face".into()).is_fatal());
    }
}
