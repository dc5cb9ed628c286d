//! 配置
//!
//! JSON 文件 + 命令行覆盖。所有数值都是可调参数，默认值见各 `Default` 实现。
//! 启动时 [`AppConfig::validate`] 失败即为致命错误。

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::control::LoopConfig;
use crate::emotion::{EmotionLabel, SmootherConfig};
use crate::error::{LampError, Result};
use crate::lamp::{BackoffConfig, DeviceAddress, FrameEncoder};
use crate::light::{LightCommand, LightPolicy, MAX_BRIGHTNESS};
use crate::perception::PerceptionConfig;
use crate::utils::time::millis;

/// 台灯设备
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSection {
    /// BLE 地址，必填
    pub address: Option<String>,
    pub service_uuid: String,
    pub characteristic_uuid: String,
    /// connect / send 的超时
    pub io_timeout_ms: u64,
    /// 连接前扫描时长，包含在 connect 的超时之内
    pub scan_ms: u64,
    /// 指令帧起始符
    pub frame_header: u8,
}

impl Default for DeviceSection {
    fn default() -> Self {
        Self {
            address: None,
            service_uuid: "0000fe01-0000-1000-8000-00805f9b34fb".to_string(),
            characteristic_uuid: "0000ff01-0000-1000-8000-00805f9b34fb".to_string(),
            io_timeout_ms: 5000,
            scan_ms: 2000,
            frame_header: FrameEncoder::DEFAULT_HEADER,
        }
    }
}

/// 情绪去抖
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingSection {
    pub confidence_threshold: f32,
    pub min_dwell_ms: u64,
    pub signal_timeout_ms: u64,
    /// 启用 focused / tired 派生情绪
    pub detect_patterns: bool,
}

impl Default for SmoothingSection {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.2,
            min_dwell_ms: 1500,
            signal_timeout_ms: 5000,
            detect_patterns: false,
        }
    }
}

/// 控制循环
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlSection {
    pub tick_ms: u64,
    /// 0 表示不重申
    pub reassert_ms: u64,
}

impl Default for ControlSection {
    fn default() -> Self {
        Self {
            tick_ms: 250,
            reassert_ms: 30_000,
        }
    }
}

/// 重连退避
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffSection {
    pub initial_ms: u64,
    pub max_ms: u64,
    pub multiplier: u32,
}

impl Default for BackoffSection {
    fn default() -> Self {
        Self {
            initial_ms: 1000,
            max_ms: 30_000,
            multiplier: 2,
        }
    }
}

/// 取帧与识别
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerceptionSection {
    pub camera_url: String,
    pub classifier_url: String,
    pub capture_interval_ms: u64,
    pub frame_skip: u32,
    pub request_timeout_ms: u64,
}

impl Default for PerceptionSection {
    fn default() -> Self {
        Self {
            camera_url: "http://127.0.0.1:8081/snapshot.jpg".to_string(),
            classifier_url: "http://127.0.0.1:5000".to_string(),
            capture_interval_ms: 100,
            frame_skip: 5,
            request_timeout_ms: 5000,
        }
    }
}

/// 完整配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub device: DeviceSection,
    pub smoothing: SmoothingSection,
    pub control: ControlSection,
    pub backoff: BackoffSection,
    pub perception: PerceptionSection,
    /// 调色板覆盖
    pub palette: BTreeMap<EmotionLabel, LightCommand>,
    /// 退出时的灯光，null 表示不发送
    pub farewell: Option<LightCommand>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            device: DeviceSection::default(),
            smoothing: SmoothingSection::default(),
            control: ControlSection::default(),
            backoff: BackoffSection::default(),
            perception: PerceptionSection::default(),
            palette: BTreeMap::new(),
            farewell: Some(LightCommand::farewell()),
        }
    }
}

impl AppConfig {
    /// 从 JSON 文件加载
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| LampError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| LampError::Config(e.to_string()))
    }

    /// 启动前检查
    pub fn validate(&self) -> Result<()> {
        self.device_address()?;
        self.service_uuid()?;
        self.characteristic_uuid()?;

        let s = &self.smoothing;
        if !(0.0..=1.0).contains(&s.confidence_threshold) {
            return Err(config_err("smoothing.confidence_threshold must be within [0, 1]"));
        }
        require_positive("smoothing.min_dwell_ms", s.min_dwell_ms)?;
        require_positive("smoothing.signal_timeout_ms", s.signal_timeout_ms)?;

        require_positive("control.tick_ms", self.control.tick_ms)?;
        require_positive("device.io_timeout_ms", self.device.io_timeout_ms)?;
        if self.device.scan_ms >= self.device.io_timeout_ms {
            return Err(config_err("device.scan_ms must be below device.io_timeout_ms"));
        }

        let b = &self.backoff;
        require_positive("backoff.initial_ms", b.initial_ms)?;
        if b.max_ms < b.initial_ms {
            return Err(config_err("backoff.max_ms must not be below backoff.initial_ms"));
        }
        if b.multiplier < 1 {
            return Err(config_err("backoff.multiplier must be at least 1"));
        }

        let p = &self.perception;
        require_positive("perception.capture_interval_ms", p.capture_interval_ms)?;
        require_positive("perception.request_timeout_ms", p.request_timeout_ms)?;
        if p.frame_skip == 0 {
            return Err(config_err("perception.frame_skip must be at least 1"));
        }

        let commands = self.palette.values().chain(self.farewell.iter());
        for command in commands {
            if command.brightness > MAX_BRIGHTNESS {
                return Err(config_err("brightness must be within 0-100"));
            }
        }

        Ok(())
    }

    pub fn device_address(&self) -> Result<DeviceAddress> {
        self.device
            .address
            .as_deref()
            .ok_or_else(|| LampError::FatalDeviceConfig("device address is required".into()))?
            .parse()
    }

    pub fn service_uuid(&self) -> Result<Uuid> {
        parse_uuid("device.service_uuid", &self.device.service_uuid)
    }

    pub fn characteristic_uuid(&self) -> Result<Uuid> {
        parse_uuid("device.characteristic_uuid", &self.device.characteristic_uuid)
    }

    pub fn io_timeout(&self) -> Duration {
        millis(self.device.io_timeout_ms)
    }

    pub fn smoother_config(&self) -> SmootherConfig {
        SmootherConfig {
            confidence_threshold: self.smoothing.confidence_threshold,
            min_dwell: millis(self.smoothing.min_dwell_ms),
            signal_timeout: millis(self.smoothing.signal_timeout_ms),
        }
    }

    pub fn backoff_config(&self) -> BackoffConfig {
        BackoffConfig {
            initial: millis(self.backoff.initial_ms),
            max: millis(self.backoff.max_ms),
            multiplier: self.backoff.multiplier,
        }
    }

    pub fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            tick: millis(self.control.tick_ms),
            reassert_interval: match self.control.reassert_ms {
                0 => None,
                ms => Some(millis(ms)),
            },
            farewell: self.farewell,
        }
    }

    pub fn perception_config(&self) -> PerceptionConfig {
        PerceptionConfig {
            capture_interval: millis(self.perception.capture_interval_ms),
            frame_skip: self.perception.frame_skip,
        }
    }

    /// 默认调色板加上覆盖项
    pub fn policy(&self) -> LightPolicy {
        self.palette
            .iter()
            .fold(LightPolicy::new(), |policy, (label, command)| {
                policy.with_entry(*label, *command)
            })
    }

    pub fn encoder(&self) -> FrameEncoder {
        FrameEncoder::new(self.device.frame_header)
    }

    #[cfg(feature = "ble")]
    pub fn ble_settings(&self) -> Result<crate::lamp::BleSettings> {
        Ok(crate::lamp::BleSettings {
            service_uuid: self.service_uuid()?,
            characteristic_uuid: self.characteristic_uuid()?,
            scan_window: millis(self.device.scan_ms),
        })
    }
}

fn config_err(msg: &str) -> LampError {
    LampError::Config(msg.to_string())
}

fn require_positive(name: &str, value: u64) -> Result<()> {
    if value == 0 {
        return Err(LampError::Config(format!("{} must be greater than 0", name)));
    }
    Ok(())
}

fn parse_uuid(name: &str, value: &str) -> Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| LampError::FatalDeviceConfig(format!("{} '{}': {}", name, value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::light::Rgb;

    fn with_address() -> AppConfig {
        let mut config = AppConfig::default();
        config.device.address = Some("AA:BB:CC:DD:EE:FF".to_string());
        config
    }

    #[test]
    fn test_defaults_validate_once_address_set() {
        assert!(matches!(
            AppConfig::default().validate(),
            Err(LampError::FatalDeviceConfig(_))
        ));
        with_address().validate().unwrap();
    }

    #[test]
    fn test_scan_window_fits_inside_connect_timeout() {
        let config = with_address();
        assert!(config.device.scan_ms < config.device.io_timeout_ms);

        let mut config = with_address();
        config.device.scan_ms = 4000;
        config.device.io_timeout_ms = 3000;
        assert!(matches!(config.validate(), Err(LampError::Config(_))));

        config.device.scan_ms = 3000;
        assert!(config.validate().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_config_reaches_lamp_after_scan() {
        use async_trait::async_trait;
        use bytes::Bytes;
        use crate::lamp::{LampConnection, LampTransport};

        // 与蓝牙传输一样，先扫描整个窗口再连接
        struct ScanningTransport {
            scan: Duration,
        }

        #[async_trait]
        impl LampTransport for ScanningTransport {
            async fn connect(&mut self, _address: &DeviceAddress) -> Result<()> {
                tokio::time::sleep(self.scan).await;
                Ok(())
            }
            async fn send(&mut self, _payload: Bytes) -> Result<()> {
                Ok(())
            }
            async fn is_connected(&mut self) -> bool {
                true
            }
            async fn disconnect(&mut self) -> Result<()> {
                Ok(())
            }
        }

        let config = with_address();
        let transport = ScanningTransport { scan: millis(config.device.scan_ms) };
        let mut conn = LampConnection::new(
            config.device_address().unwrap(),
            Box::new(transport),
            config.io_timeout(),
            config.backoff_config(),
        );
        conn.connect().await.unwrap();
        assert!(conn.is_connected());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = AppConfig::from_json(
            r#"{
                "device": {"address": "11:22:33:44:55:66"},
                "smoothing": {"min_dwell_ms": 2000},
                "palette": {"sad": {"rgb": [0, 0, 255], "brightness": 20}},
                "farewell": null
            }"#,
        )
        .unwrap();
        config.validate().unwrap();

        assert_eq!(config.smoother_config().min_dwell, Duration::from_secs(2));
        assert_eq!(config.smoothing.confidence_threshold, 0.2);
        assert_eq!(config.control.tick_ms, 250);
        assert!(config.loop_config().farewell.is_none());

        let policy = config.policy();
        assert_eq!(policy.command_for(EmotionLabel::Sad), LightCommand::new(20, Rgb(0, 0, 255)));
        assert_eq!(policy.command_for(EmotionLabel::Happy).brightness, 85);
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut config = with_address();
        config.smoothing.confidence_threshold = 1.5;
        assert!(matches!(config.validate(), Err(LampError::Config(_))));

        let mut config = with_address();
        config.backoff.max_ms = 10;
        assert!(config.validate().is_err());

        let mut config = with_address();
        config.control.tick_ms = 0;
        assert!(config.validate().is_err());

        let mut config = with_address();
        config.perception.frame_skip = 0;
        assert!(config.validate().is_err());

        let mut config = with_address();
        config.device.service_uuid = "not-a-uuid".to_string();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, LampError::FatalDeviceConfig(_)));
        assert!(err.is_fatal());

        let mut config = with_address();
        config.farewell = Some(LightCommand { rgb: Rgb::WHITE, brightness: 200 });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_reassert_zero_disables() {
        let mut config = with_address();
        config.control.reassert_ms = 0;
        assert!(config.loop_config().reassert_interval.is_none());
    }

    #[test]
    fn test_unknown_palette_label_is_rejected() {
        let err = AppConfig::from_json(r#"{"palette": {"bored": {"rgb": [1,1,1], "brightness": 1}}}"#);
        assert!(matches!(err, Err(LampError::Config(_))));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            AppConfig::load("/definitely/not/here.json"),
            Err(LampError::Config(_))
        ));
    }
}
