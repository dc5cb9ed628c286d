//! 帧来源

use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tracing::{debug, info};

use crate::error::{LampError, Result};
use crate::utils::Clock;
use super::frame::Frame;

/// 摄像头帧来源
#[async_trait]
pub trait FrameSource: Send {
    async fn next_frame(&mut self) -> Result<Frame>;
}

/// 从 HTTP 快照地址 (例如 `http://127.0.0.1:8081/snapshot.jpg`) 取帧
pub struct HttpSnapshotSource {
    client: Client,
    url: String,
    clock: Arc<dyn Clock>,
    sequence: u64,
}

impl HttpSnapshotSource {
    pub fn new(url: impl Into<String>, timeout: Duration, clock: Arc<dyn Clock>) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LampError::Config(format!("http client: {}", e)))?;

        Ok(Self {
            client,
            url: url.into(),
            clock,
            sequence: 0,
        })
    }

    /// 启动检查：能否取到一帧
    pub async fn probe(&mut self) -> Result<()> {
        let frame = self.next_frame().await?;
        if frame.is_empty() {
            return Err(LampError::CameraUnavailable(format!("{} returned an empty image", self.url)));
        }
        info!("摄像头可用: {} ({} bytes)", self.url, frame.len());
        Ok(())
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl FrameSource for HttpSnapshotSource {
    async fn next_frame(&mut self) -> Result<Frame> {
        let camera_err = |e: reqwest::Error| LampError::CameraUnavailable(e.to_string());

        let response = self.client.get(&self.url).send().await.map_err(camera_err)?;
        if !response.status().is_success() {
            return Err(LampError::CameraUnavailable(format!(
                "snapshot request failed: HTTP {}",
                response.status()
            )));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let data = response.bytes().await.map_err(camera_err)?;

        self.sequence += 1;
        debug!("frame #{} ({} bytes)", self.sequence, data.len());

        let frame = Frame::new(data, self.clock.now(), self.sequence);
        Ok(match content_type {
            Some(ct) => frame.with_content_type(ct),
            None => frame,
        })
    }
}
