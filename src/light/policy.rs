//! 情绪 → 灯光映射
//!
//! 映射表是数据：每个标签在表中占一格，按 [`EmotionLabel::index`] 查找，
//! 因此对封闭标签集合天然是全函数。

use crate::emotion::{EmotionLabel, StableEmotion};
use super::command::{LightCommand, Rgb};

/// 默认调色板，顺序与 [`EmotionLabel::ALL`] 一致
const DEFAULT_PALETTE: [(EmotionLabel, LightCommand); EmotionLabel::COUNT] = [
    (EmotionLabel::Happy, LightCommand::new(85, Rgb(255, 200, 100))),    // 暖橙
    (EmotionLabel::Sad, LightCommand::new(45, Rgb(150, 180, 255))),      // 冷蓝
    (EmotionLabel::Angry, LightCommand::new(55, Rgb(255, 100, 100))),    // 浅红
    (EmotionLabel::Neutral, LightCommand::new(65, Rgb(220, 230, 255))),  // 淡蓝
    (EmotionLabel::Surprise, LightCommand::new(70, Rgb(255, 255, 200))), // 淡黄
    (EmotionLabel::Fear, LightCommand::new(40, Rgb(100, 100, 200))),     // 蓝
    (EmotionLabel::Disgust, LightCommand::new(50, Rgb(150, 200, 100))),  // 黄绿
    (EmotionLabel::Focused, LightCommand::new(95, Rgb(255, 255, 255))),  // 纯白
    (EmotionLabel::Tired, LightCommand::new(45, Rgb(255, 180, 80))),     // 暖黄
];

/// 情绪到灯光的映射策略
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LightPolicy {
    table: [LightCommand; EmotionLabel::COUNT],
}

impl LightPolicy {
    pub fn new() -> Self {
        let mut table = [LightCommand::new(0, Rgb::WHITE); EmotionLabel::COUNT];
        for (label, command) in DEFAULT_PALETTE {
            table[label.index()] = command;
        }
        Self { table }
    }

    /// 覆盖某个标签的设定
    pub fn with_entry(mut self, label: EmotionLabel, command: LightCommand) -> Self {
        self.table[label.index()] = command;
        self
    }

    /// 稳定情绪 → 灯光指令
    pub fn map(&self, emotion: &StableEmotion) -> LightCommand {
        self.command_for(emotion.label)
    }

    pub fn command_for(&self, label: EmotionLabel) -> LightCommand {
        self.table[label.index()]
    }

    /// 遍历整张表
    pub fn entries(&self) -> impl Iterator<Item = (EmotionLabel, LightCommand)> + '_ {
        EmotionLabel::ALL.iter().map(move |l| (*l, self.table[l.index()]))
    }
}

impl Default for LightPolicy {
    fn default() -> Self {
        Self::new()
    }
}
