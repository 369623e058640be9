//! Central link manager
//!
//! Finds the sensor, checks it really is one, subscribes to its radar and
//! battery characteristics and feeds every notification into the
//! [`NotificationRelay`]. Each state has one transition function; any
//! failure routes through the [`LinkFailure`] recovery table and the cycle
//! starts again. Only the shutdown flag ends [`LinkManager::run`].

use super::error::{IdentityField, LinkFailure, Recovery, SubscriptionError, ValidationError};
use super::traits::{BleError, SourceBle};
use crate::config::radar::MAX_NOTIFICATION_SIZE;
use crate::config::source::{
    BATTERY_LEVEL_CHARACTERISTIC, BATTERY_SERVICE, DEVICE_INFO_SERVICE, EXPECTED_MANUFACTURER,
    EXPECTED_MODEL, MANUFACTURER_CHARACTERISTIC, MAX_IDENTITY_LEN, MODEL_CHARACTERISTIC,
    RADARLIGHT_CHARACTERISTIC, RADARLIGHT_SERVICE, RADAR_ACTIVATION_BYTES, TARGET_NAME,
};
use crate::config::timing::{
    DISCOVERY_SETTLE_MS, NOTIFY_POLL_MS, RADAR_PAGE_TIMEOUT_MS, RETRY_DELAY_MS, SCAN_TIMEOUT_MS,
};
use crate::config::BleUuid;
use crate::relay::NotificationRelay;
use crate::state::{BridgeSink, Clock, ConnectionState};
use core::sync::atomic::{AtomicBool, Ordering};
use embedded_hal_async::delay::DelayNs;
use heapless::String;
use log::{debug, info, warn};

/// Where the link currently is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkState<Dev, Ch> {
    Scanning,
    /// Connecting to a device found by the last scan
    Connecting(Dev),
    Validating,
    Subscribing,
    Relaying {
        radar: Ch,
        battery: Ch,
    },
    /// Tearing down after a failure
    Disconnecting(LinkFailure),
}

impl<Dev, Ch> LinkState<Dev, Ch> {
    pub const fn name(&self) -> &'static str {
        match self {
            LinkState::Scanning => "Scanning",
            LinkState::Connecting(_) => "Connecting",
            LinkState::Validating => "Validating",
            LinkState::Subscribing => "Subscribing",
            LinkState::Relaying { .. } => "Relaying",
            LinkState::Disconnecting(_) => "Disconnecting",
        }
    }
}

/// Link state for a given BLE central
pub type State<B> = LinkState<<B as SourceBle>::Device, <B as SourceBle>::Characteristic>;

/// Identity strings read from a device that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedIdentity {
    pub manufacturer: String<MAX_IDENTITY_LEN>,
    pub model: String<MAX_IDENTITY_LEN>,
}

/// Drives the upstream link and owns the relay
pub struct LinkManager<B, D, C, S> {
    source: B,
    delay: D,
    clock: C,
    sink: S,
    relay: NotificationRelay,
    identity: Option<ValidatedIdentity>,
}

impl<B, D, C, S> LinkManager<B, D, C, S>
where
    B: SourceBle,
    D: DelayNs,
    C: Clock,
    S: BridgeSink,
{
    pub fn new(source: B, delay: D, clock: C, sink: S) -> Self {
        Self {
            source,
            delay,
            clock,
            sink,
            relay: NotificationRelay::new(RADAR_PAGE_TIMEOUT_MS),
            identity: None,
        }
    }

    pub fn source(&self) -> &B {
        &self.source
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn relay(&self) -> &NotificationRelay {
        &self.relay
    }

    /// Identity of the currently validated device
    pub fn identity(&self) -> Option<&ValidatedIdentity> {
        self.identity.as_ref()
    }

    /// Run the link cycle until `shutdown` is set
    ///
    /// Shutdown is checked before every transition. An open link is then
    /// closed and downstream cleared; an in-flight wait is not interrupted.
    pub async fn run(&mut self, shutdown: &AtomicBool) {
        let mut state: State<B> = LinkState::Scanning;

        loop {
            if shutdown.load(Ordering::Relaxed) {
                info!("[Central] Shutdown requested, stopping link cycle");
                if self.source.is_connected() {
                    self.disconnect_and_clear().await;
                }
                return;
            }

            debug!("[Central] State: {}", state.name());
            state = self.step(state, shutdown).await;
        }
    }

    /// Perform one transition
    pub async fn step(&mut self, state: State<B>, shutdown: &AtomicBool) -> State<B> {
        match state {
            LinkState::Scanning => self.scan().await,
            LinkState::Connecting(device) => self.connect(device).await,
            LinkState::Validating => self.validate().await,
            LinkState::Subscribing => self.subscribe().await,
            LinkState::Relaying { radar, battery } => {
                self.relay_notifications(radar, battery, shutdown).await
            }
            LinkState::Disconnecting(failure) => self.teardown(failure).await,
        }
    }

    async fn scan(&mut self) -> State<B> {
        self.sink.set_connection_state(ConnectionState::Scanning);
        info!("[Central] Scanning for {}...", TARGET_NAME);

        match self.source.scan(TARGET_NAME, SCAN_TIMEOUT_MS).await {
            Ok(Some(device)) => {
                info!("[Central] Found {} ({:?})", TARGET_NAME, device);
                LinkState::Connecting(device)
            }
            Ok(None) => {
                info!("[Central] {} not found", TARGET_NAME);
                self.recover(LinkFailure::Discovery, None).await
            }
            Err(e) => {
                warn!("[Central] Scan failed: {:?}", e);
                self.recover(LinkFailure::Discovery, None).await
            }
        }
    }

    async fn connect(&mut self, device: B::Device) -> State<B> {
        info!("[Central] Connecting to {:?}...", device);

        match self.source.connect(&device).await {
            Ok(()) => {
                info!("[Central] Connected");
                self.sink.set_connection_state(ConnectionState::Connected);
                self.delay.delay_ms(DISCOVERY_SETTLE_MS).await;
                LinkState::Validating
            }
            Err(e) => {
                warn!("[Central] Connection failed: {:?}", e);
                if self.source.is_connected() {
                    if let Err(e) = self.source.disconnect().await {
                        warn!("[Central] Cleanup disconnect failed: {:?}", e);
                    }
                }
                self.sink.set_connection_state(ConnectionState::Disconnected);
                self.recover(LinkFailure::Connect(e), Some(device)).await
            }
        }
    }

    async fn validate(&mut self) -> State<B> {
        match self.read_identity().await {
            Ok(identity) => {
                info!(
                    "[Central] Validated device: {} model {}",
                    identity.manufacturer, identity.model
                );
                self.identity = Some(identity);
                LinkState::Subscribing
            }
            Err(e) => {
                warn!("[Central] Device validation failed: {:?}", e);
                self.recover(e.into(), None).await
            }
        }
    }

    async fn read_identity(&mut self) -> Result<ValidatedIdentity, ValidationError> {
        let service = match self.source.service(DEVICE_INFO_SERVICE).await {
            Ok(Some(service)) => service,
            Ok(None) => return Err(ValidationError::ServiceMissing),
            Err(e) => {
                debug!("[Central] Device information lookup failed: {:?}", e);
                return Err(ValidationError::ServiceMissing);
            }
        };

        let manufacturer = self
            .read_identity_field(&service, IdentityField::Manufacturer, MANUFACTURER_CHARACTERISTIC)
            .await?;
        let model = self
            .read_identity_field(&service, IdentityField::Model, MODEL_CHARACTERISTIC)
            .await?;

        if manufacturer.as_str() != EXPECTED_MANUFACTURER {
            return Err(ValidationError::Mismatch(IdentityField::Manufacturer));
        }
        if model.trim() != EXPECTED_MODEL {
            return Err(ValidationError::Mismatch(IdentityField::Model));
        }

        Ok(ValidatedIdentity {
            manufacturer,
            model,
        })
    }

    async fn read_identity_field(
        &mut self,
        service: &B::Service,
        field: IdentityField,
        uuid: BleUuid,
    ) -> Result<String<MAX_IDENTITY_LEN>, ValidationError> {
        let characteristic = match self.source.characteristic(service, uuid).await {
            Ok(Some(ch)) => ch,
            Ok(None) | Err(_) => return Err(ValidationError::CharacteristicMissing(field)),
        };

        let mut buf = [0u8; MAX_IDENTITY_LEN];
        let len = self
            .source
            .read(&characteristic, &mut buf)
            .await
            .map_err(|e| ValidationError::ReadFailed(field, e))?;

        let text = core::str::from_utf8(&buf[..len]).map_err(|_| ValidationError::NotUtf8(field))?;
        let mut value = String::new();
        value
            .push_str(text)
            .map_err(|_| ValidationError::ReadFailed(field, BleError::BufferTooSmall))?;
        Ok(value)
    }

    async fn subscribe(&mut self) -> State<B> {
        match self.subscribe_characteristics().await {
            Ok((radar, battery)) => {
                info!("[Central] Subscribed, relaying notifications");
                LinkState::Relaying { radar, battery }
            }
            Err(e) => {
                warn!("[Central] Subscription failed: {:?}", e);
                self.recover(e.into(), None).await
            }
        }
    }

    async fn subscribe_characteristics(
        &mut self,
    ) -> Result<(B::Characteristic, B::Characteristic), SubscriptionError> {
        let radar = self
            .subscribe_to(RADARLIGHT_SERVICE, RADARLIGHT_CHARACTERISTIC)
            .await?;
        self.source
            .write(&radar, &RADAR_ACTIVATION_BYTES)
            .await
            .map_err(SubscriptionError::Activation)?;
        debug!("[Central] Radar activation sent");

        let battery = self
            .subscribe_to(BATTERY_SERVICE, BATTERY_LEVEL_CHARACTERISTIC)
            .await?;

        // Seed the battery level before the first notification
        let mut buf = [0u8; 4];
        match self.source.read(&battery, &mut buf).await {
            Ok(len) => {
                let now = self.clock.now_ms();
                self.relay.on_battery_notification(&buf[..len], now, &mut self.sink);
            }
            Err(e) => warn!("[Central] Initial battery read failed: {:?}", e),
        }

        Ok((radar, battery))
    }

    async fn subscribe_to(
        &mut self,
        service_uuid: BleUuid,
        uuid: BleUuid,
    ) -> Result<B::Characteristic, SubscriptionError> {
        let service = match self.source.service(service_uuid).await {
            Ok(Some(service)) => service,
            Ok(None) | Err(_) => return Err(SubscriptionError::ServiceMissing(service_uuid)),
        };

        let characteristic = match self.source.characteristic(&service, uuid).await {
            Ok(Some(ch)) => ch,
            Ok(None) | Err(_) => return Err(SubscriptionError::CharacteristicMissing(uuid)),
        };

        self.source
            .subscribe(&characteristic)
            .await
            .map_err(|e| SubscriptionError::Subscribe(uuid, e))?;

        Ok(characteristic)
    }

    async fn relay_notifications(
        &mut self,
        radar: B::Characteristic,
        battery: B::Characteristic,
        shutdown: &AtomicBool,
    ) -> State<B> {
        let mut buf = [0u8; MAX_NOTIFICATION_SIZE];

        loop {
            if shutdown.load(Ordering::Relaxed) {
                return LinkState::Relaying { radar, battery };
            }
            if !self.source.is_connected() {
                return LinkState::Disconnecting(LinkFailure::LinkLost(None));
            }

            match self.poll(&radar, &mut buf).await {
                Ok(Some(len)) => {
                    let now = self.clock.now_ms();
                    self.relay.on_radar_notification(&buf[..len], now, &mut self.sink);
                }
                Ok(None) => {}
                Err(e) => return LinkState::Disconnecting(LinkFailure::LinkLost(Some(e))),
            }

            match self.poll(&battery, &mut buf).await {
                Ok(Some(len)) => {
                    let now = self.clock.now_ms();
                    self.relay.on_battery_notification(&buf[..len], now, &mut self.sink);
                }
                Ok(None) => {}
                Err(e) => return LinkState::Disconnecting(LinkFailure::LinkLost(Some(e))),
            }

            let now = self.clock.now_ms();
            self.relay.expire(now, &mut self.sink);
        }
    }

    /// Bounded wait for one notification
    ///
    /// An oversized notification is dropped like any other bad frame.
    async fn poll(
        &mut self,
        characteristic: &B::Characteristic,
        buf: &mut [u8],
    ) -> Result<Option<usize>, BleError> {
        match self.source.notified(characteristic, buf, NOTIFY_POLL_MS).await {
            Err(BleError::BufferTooSmall) => {
                warn!("[Relay] Oversized notification dropped");
                Ok(None)
            }
            other => other,
        }
    }

    async fn teardown(&mut self, failure: LinkFailure) -> State<B> {
        info!("[Central] Disconnecting after {:?}", failure);
        self.disconnect_and_clear().await;
        self.delay.delay_ms(RETRY_DELAY_MS).await;
        LinkState::Scanning
    }

    /// Close the link and put downstream into its "no data" state
    ///
    /// Never fails; cleanup errors are logged.
    async fn disconnect_and_clear(&mut self) {
        if self.source.is_connected() {
            if let Err(e) = self.source.disconnect().await {
                warn!("[Central] Disconnect failed: {:?}", e);
            }
        }
        self.identity = None;
        self.relay.clear_downstream(&mut self.sink);
        self.sink.set_connection_state(ConnectionState::Disconnected);
    }

    /// Route a failure through the recovery table
    async fn recover(&mut self, failure: LinkFailure, device: Option<B::Device>) -> State<B> {
        if failure.needs_teardown() {
            return LinkState::Disconnecting(failure);
        }

        self.delay.delay_ms(RETRY_DELAY_MS).await;
        match (failure.recovery(), device) {
            (Recovery::Reconnect, Some(device)) => LinkState::Connecting(device),
            _ => LinkState::Scanning,
        }
    }
}
