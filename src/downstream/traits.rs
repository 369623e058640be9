//! Peripheral-role BLE trait for abstraction and testability
//!
//! The downstream server only needs to advertise and hold a client
//! connection open. Publishing values goes through
//! [`BridgeSink`](crate::state::BridgeSink), not through this trait.

use core::future::Future;

/// Errors reported by a peripheral-role BLE stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeripheralError {
    /// Advertising could not be started
    AdvertiseFailed,
    /// A central connected but the connection could not be set up
    AcceptFailed,
    /// The client session ended with an error
    SessionFailed,
}

/// Abstract BLE peripheral interface for testability
pub trait BlePeripheral {
    /// An accepted client connection
    type Client;

    /// Advertise as `name` until a client connects
    fn advertise(
        &mut self,
        name: &str,
        interval_ms: u32,
    ) -> impl Future<Output = Result<Self::Client, PeripheralError>>;

    /// Serve a connected client, resolving once it disconnects
    fn serve(&mut self, client: Self::Client) -> impl Future<Output = Result<(), PeripheralError>>;
}
