//! 控制循环事件

use std::time::Duration;

use crate::emotion::EmotionLabel;
use crate::error::LampError;
use crate::light::LightCommand;

/// 控制循环对外发出的事件
#[derive(Debug, Clone, PartialEq)]
pub enum LoopEvent {
    /// 稳定情绪变化
    StableChanged {
        from: Option<EmotionLabel>,
        to: EmotionLabel,
        command: LightCommand,
    },
    /// 指令已写入台灯
    CommandSent {
        command: LightCommand,
        /// 是否为定期重申 (而非情绪变化或重连后的补发)
        reassert: bool,
    },
    /// 发送失败
    SendFailed { error: LampError },
    /// 连接建立
    Connected { reconnect: bool },
    /// 链路断开
    LinkLost { error: LampError },
    /// 进入退避
    BackoffScheduled { delay: Duration },
}
