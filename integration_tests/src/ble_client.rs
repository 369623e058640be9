//! BLE client for the bridge's downstream GATT server.

use std::time::Duration;

use anyhow::{anyhow, Result};
use btleplug::api::{Central, Characteristic, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::stream::BoxStream;
use futures::StreamExt;
use uuid::Uuid;

/// The bridge's radar service, advertised in its scan response
pub const RADAR_SERVICE_UUID: Uuid = Uuid::from_u128(0xf3641400_00b0_4240_ba50_05ca45bf8abc);

/// Radar characteristic of the bridge's radar service
pub const RADAR_UUID: Uuid = Uuid::from_u128(0xf3641401_00b0_4240_ba50_05ca45bf8abc);

/// Standard battery level characteristic
pub const BATTERY_LEVEL_UUID: Uuid = Uuid::from_u128(0x00002a19_0000_1000_8000_00805f9b34fb);

/// Which downstream characteristic a value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Radar,
    Battery,
}

/// One value received from the bridge
#[derive(Debug, Clone)]
pub struct Update {
    pub source: Source,
    pub value: Vec<u8>,
}

/// A connected downstream client of the bridge.
pub struct ProxyClient {
    peripheral: Peripheral,
    radar: Characteristic,
    battery: Characteristic,
    /// Service UUIDs seen while scanning
    pub advertised_services: Vec<Uuid>,
}

impl ProxyClient {
    /// Scan for the bridge by name and connect.
    pub async fn connect_by_name(name: &str, scan_timeout: Duration) -> Result<Self> {
        let manager = Manager::new().await?;
        let adapters = manager.adapters().await?;
        let adapter = adapters
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No Bluetooth adapters found"))?;

        adapter.start_scan(ScanFilter::default()).await?;
        let peripheral = Self::find_device_by_name(&adapter, name, scan_timeout).await?;
        let advertised_services = peripheral
            .properties()
            .await?
            .map(|props| props.services)
            .unwrap_or_default();
        adapter.stop_scan().await?;

        peripheral.connect().await?;
        peripheral.discover_services().await?;

        let characteristics = peripheral.characteristics();
        let find = |uuid: Uuid, what: &str| {
            characteristics
                .iter()
                .find(|c| c.uuid == uuid)
                .cloned()
                .ok_or_else(|| anyhow!("{} characteristic not found", what))
        };

        let radar = find(RADAR_UUID, "Radar")?;
        let battery = find(BATTERY_LEVEL_UUID, "Battery level")?;

        Ok(Self {
            peripheral,
            radar,
            battery,
            advertised_services,
        })
    }

    /// Find a device by name within the scan timeout.
    async fn find_device_by_name(
        adapter: &Adapter,
        name: &str,
        scan_timeout: Duration,
    ) -> Result<Peripheral> {
        let start = std::time::Instant::now();

        while start.elapsed() < scan_timeout {
            for peripheral in adapter.peripherals().await? {
                if let Some(props) = peripheral.properties().await? {
                    if props.local_name.as_deref() == Some(name) {
                        return Ok(peripheral);
                    }
                }
            }

            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        Err(anyhow!("Device '{}' not found within timeout", name))
    }

    /// Current radar and battery values.
    pub async fn read_both(&self) -> Result<(Vec<u8>, Vec<u8>)> {
        let radar = self.peripheral.read(&self.radar).await?;
        let battery = self.peripheral.read(&self.battery).await?;
        Ok((radar, battery))
    }

    /// Subscribe to both characteristics and stream their notifications.
    pub async fn updates(&self) -> Result<BoxStream<'static, Update>> {
        let notifications = self.peripheral.notifications().await?;
        self.peripheral.subscribe(&self.radar).await?;
        self.peripheral.subscribe(&self.battery).await?;

        Ok(notifications
            .filter_map(|n| async move {
                let source = match n.uuid {
                    RADAR_UUID => Source::Radar,
                    BATTERY_LEVEL_UUID => Source::Battery,
                    _ => return None,
                };
                Some(Update {
                    source,
                    value: n.value,
                })
            })
            .boxed())
    }

    /// Disconnect from the bridge.
    pub async fn disconnect(&self) -> Result<()> {
        self.peripheral.disconnect().await?;
        Ok(())
    }
}
