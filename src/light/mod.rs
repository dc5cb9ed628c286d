//! 灯光模块

pub mod command;
pub mod policy;

pub use command::{LightCommand, Rgb, MAX_BRIGHTNESS};
pub use policy::LightPolicy;
