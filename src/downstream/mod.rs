//! Downstream side of the proxy: the bridge's own peripheral

pub mod server;
pub mod traits;

pub use server::{PeripheralServer, ServeOutcome};
pub use traits::{BlePeripheral, PeripheralError};
