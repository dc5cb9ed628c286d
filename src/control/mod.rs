//! 控制循环：样本 → 去抖 → 映射 → 台灯

pub mod event;
pub mod control_loop;

pub use event::LoopEvent;
pub use control_loop::{ControlLoop, LoopConfig, LoopStats, TickReport};
