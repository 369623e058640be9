#![cfg_attr(not(test), no_std)]

pub mod adv;
pub mod config;
pub mod downstream;
pub mod relay;
pub mod source;
pub mod state;

// These modules depend on the ESP32 BLE stack only available with the embedded feature
#[cfg(feature = "embedded")]
pub mod ble;
#[cfg(feature = "embedded")]
pub mod signals;
#[cfg(feature = "embedded")]
pub mod tasks;
