//! btleplug 蓝牙传输

use std::time::Duration;
use async_trait::async_trait;
use btleplug::api::{BDAddr, Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType};
use btleplug::platform::{Adapter, Manager, Peripheral};
use bytes::Bytes;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{LampError, Result};
use super::address::DeviceAddress;
use super::transport::LampTransport;

fn transport_err(e: btleplug::Error) -> LampError {
    LampError::Transport(e.to_string())
}

/// 蓝牙参数
#[derive(Debug, Clone)]
pub struct BleSettings {
    pub service_uuid: Uuid,
    pub characteristic_uuid: Uuid,
    /// 每次连接前的扫描时长
    pub scan_window: Duration,
}

/// 通过系统蓝牙适配器写控制特征值
pub struct BleTransport {
    adapter: Adapter,
    settings: BleSettings,
    session: Option<(Peripheral, Characteristic)>,
}

impl BleTransport {
    /// 取第一个可用的蓝牙适配器
    pub async fn new(settings: BleSettings) -> Result<Self> {
        let manager = Manager::new().await.map_err(transport_err)?;
        let adapter = manager
            .adapters()
            .await
            .map_err(transport_err)?
            .into_iter()
            .next()
            .ok_or_else(|| LampError::FatalDeviceConfig("no bluetooth adapter found".into()))?;

        Ok(Self {
            adapter,
            settings,
            session: None,
        })
    }

    async fn find(&self, address: &DeviceAddress) -> Result<Peripheral> {
        let target = BDAddr::from(address.octets());

        self.adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(transport_err)?;
        tokio::time::sleep(self.settings.scan_window).await;
        let peripherals = self.adapter.peripherals().await.map_err(transport_err);
        if let Err(e) = self.adapter.stop_scan().await {
            debug!("stop_scan failed: {}", e);
        }

        peripherals?
            .into_iter()
            .find(|p| p.address() == target)
            .ok_or_else(|| LampError::Transport(format!("{} not found during scan", address)))
    }

    async fn control_characteristic(
        &self,
        peripheral: &Peripheral,
        address: &DeviceAddress,
    ) -> Result<Characteristic> {
        peripheral.discover_services().await.map_err(transport_err)?;
        peripheral
            .characteristics()
            .into_iter()
            .find(|c| {
                c.uuid == self.settings.characteristic_uuid
                    && c.service_uuid == self.settings.service_uuid
            })
            .ok_or_else(|| {
                LampError::Transport(format!(
                    "characteristic {} not found on {}",
                    self.settings.characteristic_uuid, address
                ))
            })
    }
}

#[async_trait]
impl LampTransport for BleTransport {
    async fn connect(&mut self, address: &DeviceAddress) -> Result<()> {
        let peripheral = self.find(address).await?;
        peripheral.connect().await.map_err(transport_err)?;

        match self.control_characteristic(&peripheral, address).await {
            Ok(characteristic) => {
                info!("已找到控制特征值 {}", characteristic.uuid);
                self.session = Some((peripheral, characteristic));
                Ok(())
            }
            Err(e) => {
                // 不留下半开的连接
                if let Err(de) = peripheral.disconnect().await {
                    debug!("disconnect after failed discovery: {}", de);
                }
                Err(e)
            }
        }
    }

    async fn send(&mut self, payload: Bytes) -> Result<()> {
        let (peripheral, characteristic) = self
            .session
            .as_ref()
            .ok_or(LampError::NotConnected)?;
        peripheral
            .write(characteristic, &payload, WriteType::WithoutResponse)
            .await
            .map_err(transport_err)
    }

    async fn is_connected(&mut self) -> bool {
        match &self.session {
            Some((peripheral, _)) => peripheral.is_connected().await.unwrap_or(false),
            None => false,
        }
    }

    async fn disconnect(&mut self) -> Result<()> {
        if let Some((peripheral, _)) = self.session.take() {
            peripheral.disconnect().await.map_err(transport_err)?;
        }
        Ok(())
    }
}
