//! Central-role BLE trait for abstraction and testability
//!
//! The link manager drives the sensor through this trait, so the
//! trouble-host central on target and a scripted mock on the host are
//! interchangeable.

use crate::config::BleUuid;
use core::fmt::Debug;
use core::future::Future;

/// Errors reported by a central-role BLE stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BleError {
    /// Scan could not be started or aborted
    ScanFailed,
    /// Connection attempt failed or timed out
    ConnectFailed,
    /// Operation needs an open link
    NotConnected,
    /// Link dropped while the operation was pending
    Disconnected,
    ReadFailed,
    WriteFailed,
    SubscribeFailed,
    /// GATT service or characteristic discovery failed
    DiscoveryFailed,
    /// Value does not fit the caller's buffer
    BufferTooSmall,
}

/// Abstract BLE central interface for testability
///
/// One link at a time. Service and characteristic handles are only valid
/// for the link they were looked up on.
pub trait SourceBle {
    /// Handle to a discovered advertiser
    type Device: Clone + Debug;
    type Service;
    type Characteristic;

    /// Scan for an advertiser whose local name equals `name`
    ///
    /// Returns `None` if nothing matched within `timeout_ms`.
    fn scan(
        &mut self,
        name: &str,
        timeout_ms: u32,
    ) -> impl Future<Output = Result<Option<Self::Device>, BleError>>;

    /// Open a link to a discovered device
    fn connect(&mut self, device: &Self::Device) -> impl Future<Output = Result<(), BleError>>;

    /// Close the link if one is open
    fn disconnect(&mut self) -> impl Future<Output = Result<(), BleError>>;

    /// Whether the link is still up
    fn is_connected(&self) -> bool;

    /// Look up a primary service on the connected device
    fn service(
        &mut self,
        uuid: BleUuid,
    ) -> impl Future<Output = Result<Option<Self::Service>, BleError>>;

    /// Look up a characteristic within a service
    fn characteristic(
        &mut self,
        service: &Self::Service,
        uuid: BleUuid,
    ) -> impl Future<Output = Result<Option<Self::Characteristic>, BleError>>;

    /// Read a characteristic value into `buf`, returning its length
    fn read(
        &mut self,
        characteristic: &Self::Characteristic,
        buf: &mut [u8],
    ) -> impl Future<Output = Result<usize, BleError>>;

    fn write(
        &mut self,
        characteristic: &Self::Characteristic,
        data: &[u8],
    ) -> impl Future<Output = Result<(), BleError>>;

    /// Enable notifications on a characteristic
    fn subscribe(
        &mut self,
        characteristic: &Self::Characteristic,
    ) -> impl Future<Output = Result<(), BleError>>;

    /// Wait up to `timeout_ms` for the next notification
    ///
    /// Returns `Ok(None)` on timeout.
    fn notified(
        &mut self,
        characteristic: &Self::Characteristic,
        buf: &mut [u8],
        timeout_ms: u32,
    ) -> impl Future<Output = Result<Option<usize>, BleError>>;
}
