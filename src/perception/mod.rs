//! 感知模块：取帧、情绪识别、向控制循环交付样本
//!
//! 这一侧与控制循环并发运行，唯一的交汇点是 [`crate::emotion::SampleSlot`]。

pub mod frame;
pub mod types;
pub mod source;
pub mod classifier;
pub mod pipeline;

pub use frame::Frame;
pub use source::{FrameSource, HttpSnapshotSource};
pub use classifier::{EmotionClassifier, HttpClassifier};
pub use pipeline::{PerceptionConfig, PerceptionPipeline, PerceptionStats};
