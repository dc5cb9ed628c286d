//! 灯光指令

use std::fmt;
use serde::{Deserialize, Serialize};

/// 亮度上限 (百分比)
pub const MAX_BRIGHTNESS: u8 = 100;

/// RGB 颜色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const WHITE: Rgb = Rgb(255, 255, 255);
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

/// 一次灯光设定
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LightCommand {
    pub rgb: Rgb,
    /// 亮度 (0-100)
    pub brightness: u8,
}

impl LightCommand {
    /// 亮度超过上限时截断
    pub const fn new(brightness: u8, rgb: Rgb) -> Self {
        let brightness = if brightness > MAX_BRIGHTNESS { MAX_BRIGHTNESS } else { brightness };
        Self { rgb, brightness }
    }

    /// 退出时的柔和灯光
    pub const fn farewell() -> Self {
        Self::new(30, Rgb(255, 255, 200))
    }
}

impl fmt::Display for LightCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}%", self.rgb, self.brightness)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brightness_clamped() {
        assert_eq!(LightCommand::new(140, Rgb::WHITE).brightness, 100);
        assert_eq!(LightCommand::new(0, Rgb::WHITE).brightness, 0);
    }

    #[test]
    fn test_display() {
        let cmd = LightCommand::new(85, Rgb(255, 200, 100));
        assert_eq!(cmd.to_string(), "#ffc864 @ 85%");
    }

    #[test]
    fn test_deserialize() {
        let cmd: LightCommand =
            serde_json::from_str(r#"{"rgb": [10, 20, 30], "brightness": 40}"#).unwrap();
        assert_eq!(cmd, LightCommand::new(40, Rgb(10, 20, 30)));
    }
}
