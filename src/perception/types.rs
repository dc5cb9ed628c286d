//! 情绪识别服务的请求 / 响应类型

use std::collections::HashMap;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::emotion::{EmotionLabel, EmotionSample};
use crate::error::{LampError, Result};

/// 分析请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    /// 图像 (Base64)
    pub image: String,
    /// MIME 类型
    pub content_type: Option<String>,
    /// 需要的分析项
    pub actions: Vec<String>,
}

/// 分析响应 (DeepFace 风格，分数为百分比)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    /// 主要情绪，未检测到人脸时为空
    pub dominant_emotion: Option<String>,
    /// 各情绪得分 (0-100)
    #[serde(default)]
    pub emotion: HashMap<String, f32>,
}

impl AnalyzeResponse {
    /// 转为样本，置信度取主要情绪的得分
    pub fn into_sample(self, timestamp: Instant) -> Result<EmotionSample> {
        let dominant = self
            .dominant_emotion
            .ok_or_else(|| LampError::ClassificationUnavailable("no face detected".into()))?;
        let label: EmotionLabel = dominant.parse()?;

        let score = self.emotion.get(&dominant).copied().unwrap_or(0.0);
        Ok(EmotionSample::new(label, score / 100.0, timestamp))
    }
}
