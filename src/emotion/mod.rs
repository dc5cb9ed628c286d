//! 情绪模块：原始样本、单槽交接、去抖与派生情绪

pub mod sample;
pub mod smoother;
pub mod pattern;

pub use sample::{EmotionLabel, EmotionSample, SampleSlot};
pub use smoother::{EmotionSmoother, SmootherConfig, StableEmotion};
pub use pattern::MoodPatterns;
