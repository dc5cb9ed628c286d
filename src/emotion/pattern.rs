//! 派生情绪检测
//!
//! 根据最近的高置信度标签历史识别 "专注" 和 "疲惫"：
//! - 最近 10 个里 neutral + happy 不少于 8 个 → `Focused`
//! - 否则最近 10 个里 sad 不少于 6 个 → `Tired`

use std::collections::VecDeque;
use tracing::debug;

use super::sample::{EmotionLabel, EmotionSample};

const HISTORY_LEN: usize = 20;
const PATTERN_WINDOW: usize = 10;
const FOCUSED_MIN: usize = 8;
const TIRED_MIN: usize = 6;

/// 派生情绪检测器
pub struct MoodPatterns {
    history: VecDeque<EmotionLabel>,
    confidence_threshold: f32,
}

impl MoodPatterns {
    pub fn new(confidence_threshold: f32) -> Self {
        Self {
            history: VecDeque::with_capacity(HISTORY_LEN),
            confidence_threshold,
        }
    }

    /// 记录样本并在命中模式时改写标签
    ///
    /// 低置信度样本原样返回，不进入历史。
    pub fn apply(&mut self, sample: EmotionSample) -> EmotionSample {
        if sample.confidence < self.confidence_threshold {
            return sample;
        }

        if self.history.len() >= HISTORY_LEN {
            self.history.pop_front();
        }
        self.history.push_back(sample.label);

        match self.detect() {
            Some(mood) if mood != sample.label => {
                debug!("派生情绪: {} -> {}", sample.label, mood);
                sample.relabel(mood)
            }
            _ => sample,
        }
    }

    fn detect(&self) -> Option<EmotionLabel> {
        if self.history.len() < PATTERN_WINDOW {
            return None;
        }

        let recent = self.history.iter().rev().take(PATTERN_WINDOW);
        let (mut calm, mut sad) = (0, 0);
        for label in recent {
            match label {
                EmotionLabel::Neutral | EmotionLabel::Happy => calm += 1,
                EmotionLabel::Sad => sad += 1,
                _ => {}
            }
        }

        if calm >= FOCUSED_MIN {
            Some(EmotionLabel::Focused)
        } else if sad >= TIRED_MIN {
            Some(EmotionLabel::Tired)
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }
}
