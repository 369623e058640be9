//! trouble-host adapters for the BLE traits
//!
//! The central side runs as an actor task owning the trouble-host
//! connection and GATT client; [`central::ChannelCentral`] implements
//! [`SourceBle`](crate::source::SourceBle) on top of it. The peripheral
//! side implements [`BlePeripheral`](crate::downstream::BlePeripheral)
//! directly against the GATT server.

pub mod central;
pub mod peripheral;
pub mod scan;
pub mod server;

pub use central::{central_actor, ChannelCentral};
pub use peripheral::TroublePeripheral;
pub use scan::ScanEventHandler;
pub use server::Server;

use crate::config::BleUuid;
use trouble_host::prelude::{ExternalController, Uuid};

/// HCI command slots for the external controller
pub const CONTROLLER_SLOTS: usize = 10;

/// The ESP32-S3 BLE controller as seen by trouble-host
pub type BleController =
    ExternalController<esp_radio::ble::controller::BleConnector<'static>, CONTROLLER_SLOTS>;

impl From<BleUuid> for Uuid {
    fn from(uuid: BleUuid) -> Self {
        match uuid {
            BleUuid::Short(short) => Uuid::from(short),
            BleUuid::Long(long) => Uuid::from(long),
        }
    }
}
