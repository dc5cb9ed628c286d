//! 情绪样本
//!
//! 识别器每处理一帧产生一个 [`EmotionSample`]，通过 [`SampleSlot`]
//! 交给控制循环。槽位只保留最新的一个样本。

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::error::LampError;

/// 情绪标签 (封闭集合)
///
/// 前七个来自识别器；`Focused` / `Tired` 由 [`super::MoodPatterns`] 派生。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmotionLabel {
    Happy,
    Sad,
    Angry,
    Neutral,
    Surprise,
    Fear,
    Disgust,
    Focused,
    Tired,
}

impl EmotionLabel {
    pub const COUNT: usize = 9;

    pub const ALL: [EmotionLabel; Self::COUNT] = [
        Self::Happy,
        Self::Sad,
        Self::Angry,
        Self::Neutral,
        Self::Surprise,
        Self::Fear,
        Self::Disgust,
        Self::Focused,
        Self::Tired,
    ];

    /// 在 [`Self::ALL`] 中的位置
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Happy => "happy",
            Self::Sad => "sad",
            Self::Angry => "angry",
            Self::Neutral => "neutral",
            Self::Surprise => "surprise",
            Self::Fear => "fear",
            Self::Disgust => "disgust",
            Self::Focused => "focused",
            Self::Tired => "tired",
        }
    }
}

impl fmt::Display for EmotionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmotionLabel {
    type Err = LampError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label = match s.trim().to_lowercase().as_str() {
            "happy" | "happiness" | "joy" => Self::Happy,
            "sad" | "sadness" => Self::Sad,
            "angry" | "anger" => Self::Angry,
            "neutral" | "calm" => Self::Neutral,
            "surprise" | "surprised" => Self::Surprise,
            "fear" | "fearful" => Self::Fear,
            "disgust" | "disgusted" => Self::Disgust,
            "focused" | "focus" => Self::Focused,
            "tired" => Self::Tired,
            other => {
                return Err(LampError::ClassificationUnavailable(format!(
                    "unknown emotion label '{}'",
                    other
                )))
            }
        };
        Ok(label)
    }
}

/// 一次识别结果，创建后不可变
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmotionSample {
    pub label: EmotionLabel,
    /// 置信度 (0-1)
    pub confidence: f32,
    /// 单调时间戳
    pub timestamp: Instant,
}

impl EmotionSample {
    pub fn new(label: EmotionLabel, confidence: f32, timestamp: Instant) -> Self {
        Self {
            label,
            confidence: confidence.clamp(0.0, 1.0),
            timestamp,
        }
    }

    /// 换标签，其余不变
    pub fn relabel(self, label: EmotionLabel) -> Self {
        Self { label, ..self }
    }
}

/// 单槽 "最新样本" 交接
///
/// 识别任务写入，控制循环取走；未被取走的旧样本直接被覆盖。
#[derive(Debug, Default)]
pub struct SampleSlot {
    latest: Arc<Mutex<Option<EmotionSample>>>,
}

impl SampleSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入最新样本，返回是否覆盖了一个未消费的样本
    pub fn publish(&self, sample: EmotionSample) -> bool {
        self.latest.lock().replace(sample).is_some()
    }

    /// 取走最新样本
    pub fn take(&self) -> Option<EmotionSample> {
        self.latest.lock().take()
    }

    pub fn is_empty(&self) -> bool {
        self.latest.lock().is_none()
    }
}

impl Clone for SampleSlot {
    fn clone(&self) -> Self {
        Self {
            latest: Arc::clone(&self.latest),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_parse() {
        assert_eq!("happy".parse::<EmotionLabel>().unwrap(), EmotionLabel::Happy);
        assert_eq!("Surprised".parse::<EmotionLabel>().unwrap(), EmotionLabel::Surprise);
        assert_eq!(" sad ".parse::<EmotionLabel>().unwrap(), EmotionLabel::Sad);
        assert!(matches!(
            "bored".parse::<EmotionLabel>(),
            Err(LampError::ClassificationUnavailable(_))
        ));
    }

    #[test]
    fn test_label_index_matches_all() {
        for (i, label) in EmotionLabel::ALL.iter().enumerate() {
            assert_eq!(label.index(), i);
            assert_eq!(label.as_str().parse::<EmotionLabel>().unwrap(), *label);
        }
    }

    #[test]
    fn test_confidence_clamped() {
        let s = EmotionSample::new(EmotionLabel::Fear, 1.7, Instant::now());
        assert_eq!(s.confidence, 1.0);
        let s = EmotionSample::new(EmotionLabel::Fear, -0.2, Instant::now());
        assert_eq!(s.confidence, 0.0);
    }

    #[test]
    fn test_slot_keeps_only_latest() {
        let slot = SampleSlot::new();
        let writer = slot.clone();
        let now = Instant::now();

        assert!(!writer.publish(EmotionSample::new(EmotionLabel::Sad, 0.9, now)));
        assert!(writer.publish(EmotionSample::new(EmotionLabel::Happy, 0.8, now)));

        let taken = slot.take().unwrap();
        assert_eq!(taken.label, EmotionLabel::Happy);
        assert!(slot.take().is_none());
        assert!(slot.is_empty());
    }
}
