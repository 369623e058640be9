//! Downstream peripheral server
//!
//! Advertises the bridge and holds one client at a time. Runs
//! independently of the upstream link: a client may connect and read the
//! "no data" view while the sensor is out of range.

use super::traits::{BlePeripheral, PeripheralError};
use crate::config::peripheral::{ADV_INTERVAL_MS, NAME};
use crate::config::timing::ADVERTISE_RETRY_MS;
use core::sync::atomic::{AtomicBool, Ordering};
use embedded_hal_async::delay::DelayNs;
use log::{info, warn};

/// Result of one advertise-and-serve round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeOutcome {
    /// A client connected and later disconnected
    Served,
    /// Advertising failed; retried after a delay
    AdvertiseFailed(PeripheralError),
    /// The client session ended with an error
    SessionFailed(PeripheralError),
}

/// Advertise, serve, re-advertise
pub struct PeripheralServer<P, D> {
    peripheral: P,
    delay: D,
    name: &'static str,
    interval_ms: u32,
    sessions: u32,
}

impl<P: BlePeripheral, D: DelayNs> PeripheralServer<P, D> {
    /// Server advertising under the configured bridge name
    pub fn new(peripheral: P, delay: D) -> Self {
        Self::with_identity(peripheral, delay, NAME, ADV_INTERVAL_MS)
    }

    pub fn with_identity(peripheral: P, delay: D, name: &'static str, interval_ms: u32) -> Self {
        Self {
            peripheral,
            delay,
            name,
            interval_ms,
            sessions: 0,
        }
    }

    pub fn peripheral(&self) -> &P {
        &self.peripheral
    }

    /// Client sessions served so far
    pub fn sessions(&self) -> u32 {
        self.sessions
    }

    /// Advertise until a client connects, then serve it until it leaves
    pub async fn serve_one(&mut self) -> ServeOutcome {
        info!("[Peripheral] Advertising as '{}'", self.name);

        let client = match self.peripheral.advertise(self.name, self.interval_ms).await {
            Ok(client) => client,
            Err(e) => {
                warn!(
                    "[Peripheral] Advertising failed: {:?}, retrying in {} ms",
                    e, ADVERTISE_RETRY_MS
                );
                self.delay.delay_ms(ADVERTISE_RETRY_MS).await;
                return ServeOutcome::AdvertiseFailed(e);
            }
        };

        info!("[Peripheral] Client connected");
        self.sessions = self.sessions.wrapping_add(1);

        match self.peripheral.serve(client).await {
            Ok(()) => {
                info!("[Peripheral] Client disconnected");
                ServeOutcome::Served
            }
            Err(e) => {
                warn!("[Peripheral] Client session ended with error: {:?}", e);
                ServeOutcome::SessionFailed(e)
            }
        }
    }

    /// Serve clients until `shutdown` is set
    pub async fn run(&mut self, shutdown: &AtomicBool) {
        while !shutdown.load(Ordering::Relaxed) {
            self.serve_one().await;
        }
        info!("[Peripheral] Stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downstream::traits::mock::{MockPeripheral, PeripheralCall};
    use crate::state::mock::{VirtualDelay, VirtualTime};
    use crate::state::Clock;
    use futures::executor::block_on;

    #[test]
    fn test_serves_and_readvertises() {
        let time = VirtualTime::new();
        let shutdown = AtomicBool::new(false);
        let mut peripheral = MockPeripheral::new(&time);
        peripheral.shutdown_after_rounds(&shutdown, 3);
        let mut server = PeripheralServer::new(peripheral, VirtualDelay::new(&time));

        block_on(server.run(&shutdown));

        assert_eq!(server.sessions(), 3);
        assert_eq!(
            server.peripheral().calls(),
            &[
                PeripheralCall::Advertise { interval_ms: ADV_INTERVAL_MS },
                PeripheralCall::Serve(1),
                PeripheralCall::Advertise { interval_ms: ADV_INTERVAL_MS },
                PeripheralCall::Serve(2),
                PeripheralCall::Advertise { interval_ms: ADV_INTERVAL_MS },
                PeripheralCall::Serve(3),
            ]
        );
        assert_eq!(server.peripheral().advertised_name(), Some(NAME));
    }

    #[test]
    fn test_advertise_failure_waits_then_retries() {
        let time = VirtualTime::new();
        let mut peripheral = MockPeripheral::new(&time);
        peripheral.queue_advertise(Err(PeripheralError::AdvertiseFailed));
        let mut server = PeripheralServer::new(peripheral, VirtualDelay::new(&time));

        let first = block_on(server.serve_one());
        assert_eq!(first, ServeOutcome::AdvertiseFailed(PeripheralError::AdvertiseFailed));
        assert_eq!(time.now_ms(), u64::from(ADVERTISE_RETRY_MS));
        assert_eq!(server.sessions(), 0);

        let second = block_on(server.serve_one());
        assert_eq!(second, ServeOutcome::Served);
        assert_eq!(server.sessions(), 1);
    }

    #[test]
    fn test_session_error_does_not_stop_server() {
        let time = VirtualTime::new();
        let shutdown = AtomicBool::new(false);
        let mut peripheral = MockPeripheral::new(&time);
        peripheral.queue_serve(Err(PeripheralError::SessionFailed));
        peripheral.shutdown_after_rounds(&shutdown, 2);
        let mut server = PeripheralServer::new(peripheral, VirtualDelay::new(&time));

        block_on(server.run(&shutdown));
        assert_eq!(server.sessions(), 2);
        assert_eq!(server.peripheral().advertise_count(), 2);
    }

    #[test]
    fn test_custom_identity() {
        let time = VirtualTime::new();
        let peripheral = MockPeripheral::new(&time);
        let mut server =
            PeripheralServer::with_identity(peripheral, VirtualDelay::new(&time), "Bench", 100);

        block_on(server.serve_one());
        assert_eq!(server.peripheral().advertised_name(), Some("Bench"));
        assert_eq!(
            server.peripheral().calls()[0],
            PeripheralCall::Advertise { interval_ms: 100 }
        );
    }
}
