//! 摄像头帧

use bytes::Bytes;
use tokio::time::Instant;

/// 一帧已编码的图像 (JPEG/PNG，零拷贝)
#[derive(Clone, Debug)]
pub struct Frame {
    pub data: Bytes,
    /// 采集时刻
    pub captured_at: Instant,
    /// MIME 类型，未知时为 None
    pub content_type: Option<String>,
    /// 采集序号 (从 1 开始)
    pub sequence: u64,
}

impl Frame {
    pub fn new(data: Bytes, captured_at: Instant, sequence: u64) -> Self {
        Self {
            data,
            captured_at,
            content_type: None,
            sequence,
        }
    }

    /// 从 Vec<u8> 创建
    pub fn from_vec(data: Vec<u8>, captured_at: Instant, sequence: u64) -> Self {
        Self::new(Bytes::from(data), captured_at, sequence)
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
