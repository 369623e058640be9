//! Shared bridge state and the seams it is published through
//!
//! The link manager is the single writer. Everything downstream of it
//! (the GATT server, the status LED) only ever sees what goes through a
//! [`BridgeSink`].

/// Coarse upstream link status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Scanning,
    Connected,
    Disconnected,
}

impl ConnectionState {
    /// Pause between LED blinks for this state
    pub const fn blink_interval_ms(self) -> u64 {
        match self {
            ConnectionState::Scanning => 500,
            ConnectionState::Connected => 1_000,
            ConnectionState::Disconnected => 2_500,
        }
    }
}

/// Where the relay publishes the downstream view
///
/// Every call is a characteristic write with a change notification to any
/// subscribed client. An empty payload is the "no data" state.
pub trait BridgeSink {
    /// Publish the merged radar view
    fn publish_radar(&mut self, payload: &[u8]);

    /// Publish the battery level
    fn publish_battery(&mut self, payload: &[u8]);

    /// Record the new upstream connection state
    fn set_connection_state(&mut self, state: ConnectionState);
}

/// Monotonic millisecond clock
pub trait Clock {
    fn now_ms(&self) -> u64;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}
