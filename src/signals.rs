//! Cross-task signals
//!
//! The link manager publishes through [`WatchSink`]; the peripheral and the
//! LED task follow the watches. The button task drives [`SHUTDOWN`] and
//! wakes the BLE task through [`BUTTON_PRESSED`].

use crate::config::peripheral::INITIAL_BATTERY;
use crate::config::radar::MERGED_SIZE;
use crate::state::{BridgeSink, Clock, ConnectionState};
use core::sync::atomic::{AtomicBool, Ordering};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_sync::watch::Watch;
use embassy_time::Instant;
use heapless::Vec;
use log::warn;

/// Merged radar view as published downstream
pub type RadarValue = Vec<u8, MERGED_SIZE>;

/// Battery level as published downstream, empty when unknown
pub type BatteryValue = Vec<u8, 1>;

pub static RADAR_WATCH: Watch<CriticalSectionRawMutex, RadarValue, 2> = Watch::new();
pub static BATTERY_WATCH: Watch<CriticalSectionRawMutex, BatteryValue, 2> = Watch::new();
pub static CONNECTION_STATE: Watch<CriticalSectionRawMutex, ConnectionState, 2> = Watch::new();

/// Set while the bridge is stopped
pub static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// Raised on every button press
pub static BUTTON_PRESSED: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Flip between running and stopped, returning whether the bridge now runs
pub fn toggle_shutdown() -> bool {
    let stopped = !SHUTDOWN.load(Ordering::Relaxed);
    SHUTDOWN.store(stopped, Ordering::Relaxed);
    BUTTON_PRESSED.signal(());
    !stopped
}

/// Downstream view before the sensor has reported anything
pub fn publish_initial_state() {
    RADAR_WATCH.sender().send(Vec::new());
    BATTERY_WATCH
        .sender()
        .send(Vec::from_slice(&INITIAL_BATTERY).unwrap_or_default());
    CONNECTION_STATE.sender().send(ConnectionState::Disconnected);
}

/// [`BridgeSink`] publishing into the signal watches
pub struct WatchSink;

impl BridgeSink for WatchSink {
    fn publish_radar(&mut self, payload: &[u8]) {
        match Vec::from_slice(payload) {
            Ok(value) => RADAR_WATCH.sender().send(value),
            Err(()) => warn!("[Relay] Radar view of {} bytes dropped", payload.len()),
        }
    }

    fn publish_battery(&mut self, payload: &[u8]) {
        match Vec::from_slice(payload) {
            Ok(value) => BATTERY_WATCH.sender().send(value),
            Err(()) => warn!("[Relay] Battery value of {} bytes dropped", payload.len()),
        }
    }

    fn set_connection_state(&mut self, state: ConnectionState) {
        CONNECTION_STATE.sender().send(state);
    }
}

/// Embassy time driver as a [`Clock`]
pub struct EmbassyClock;

impl Clock for EmbassyClock {
    fn now_ms(&self) -> u64 {
        Instant::now().as_millis()
    }
}
