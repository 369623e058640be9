//! Embassy tasks module
//!
//! Task bodies for the firmware; `main.rs` wraps them as executor tasks.

pub mod ble;
pub mod led;

pub use ble::ble_task;
pub use led::led_task;
