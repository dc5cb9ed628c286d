//! 情绪识别
//!
//! 识别本身由外部推理服务完成，这里只负责调用和结果转换。

use std::time::Duration;
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use reqwest::Client;
use tracing::{debug, warn};

use crate::emotion::EmotionSample;
use crate::error::{LampError, Result};
use super::frame::Frame;
use super::types::{AnalyzeRequest, AnalyzeResponse};

/// 情绪识别器
#[async_trait]
pub trait EmotionClassifier: Send + Sync {
    /// 失败时返回 `ClassificationUnavailable`，调用方视为 "本帧无样本"
    async fn classify(&self, frame: &Frame) -> Result<EmotionSample>;
}

/// 调用 HTTP 情绪识别服务 (`POST {base_url}/analyze`)
pub struct HttpClassifier {
    client: Client,
    base_url: String,
}

impl HttpClassifier {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LampError::Config(format!("http client: {}", e)))?;

        let base_url: String = base_url.into();
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// 健康检查
    pub async fn health(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self.client.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                warn!("classifier health check failed: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl EmotionClassifier for HttpClassifier {
    async fn classify(&self, frame: &Frame) -> Result<EmotionSample> {
        let unavailable = |e: reqwest::Error| LampError::ClassificationUnavailable(e.to_string());
        let url = format!("{}/analyze", self.base_url);

        let request = AnalyzeRequest {
            image: BASE64.encode(&frame.data),
            content_type: frame.content_type.clone(),
            actions: vec!["emotion".to_string()],
        };

        debug!("analyze frame #{}", frame.sequence);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(unavailable)?;

        if !response.status().is_success() {
            let status = response.status();
            let error = response.text().await.unwrap_or_default();
            return Err(LampError::ClassificationUnavailable(format!(
                "analyze failed: HTTP {} {}",
                status, error
            )));
        }

        let result: AnalyzeResponse = response.json().await.map_err(unavailable)?;
        // 样本时间取帧的采集时刻，与识别耗时无关
        result.into_sample(frame.captured_at)
    }
}
