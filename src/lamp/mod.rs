//! 台灯模块：地址、传输适配、退避与连接状态机

pub mod address;
pub mod transport;
pub mod backoff;
pub mod connection;
pub mod mock;
#[cfg(feature = "ble")]
pub mod ble;

pub use address::DeviceAddress;
pub use transport::{CommandEncoder, FrameEncoder, LampTransport, LogTransport};
pub use backoff::{Backoff, BackoffConfig};
pub use connection::{LampConnection, LinkState};
pub use mock::MockTransport;
#[cfg(feature = "ble")]
pub use ble::{BleSettings, BleTransport};
