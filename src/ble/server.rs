//! GATT server exposed to downstream clients
//!
//! - Radar service: F3641400-00B0-4240-BA50-05CA45BF8ABC
//!   - Radar characteristic: F3641401-... (read, notify), merged pages
//! - Battery service: 0x180F
//!   - Battery level: 0x2A19 (read, notify)
//!
//! Values are variable length so an empty value can signal "no data".

use crate::config::peripheral::{RADAR_CHARACTERISTIC, RADAR_SERVICE};
use crate::config::radar::MERGED_SIZE;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use heapless::Vec;
use trouble_host::prelude::*;

const RADAR_SERVICE_UUID: u128 = RADAR_SERVICE.as_u128();
const RADAR_CHARACTERISTIC_UUID: u128 = RADAR_CHARACTERISTIC.as_u128();

/// Merged radar view
#[gatt_service(uuid = RADAR_SERVICE_UUID.to_le_bytes())]
pub struct RadarService {
    #[characteristic(uuid = RADAR_CHARACTERISTIC_UUID.to_le_bytes(), read, notify)]
    pub radar: Vec<u8, MERGED_SIZE>,
}

/// Standard battery service
#[gatt_service(uuid = service::BATTERY)]
pub struct BatteryService {
    #[characteristic(uuid = characteristic::BATTERY_LEVEL, read, notify)]
    pub level: Vec<u8, 1>,
}

#[gatt_server(mutex_type = CriticalSectionRawMutex)]
pub struct Server {
    pub radar_service: RadarService,
    pub battery_service: BatteryService,
}
