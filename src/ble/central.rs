//! Central actor
//!
//! trouble-host's GATT client borrows the connection and needs its
//! `task()` polled for as long as the link is up, so the central role
//! lives in one task. The link manager talks to it over a request and a
//! response channel through [`ChannelCentral`]. Services and
//! characteristics are handed out as slot indices valid for the current
//! link only.

use super::scan::{MAX_NAME_LEN, SCAN_CHANNEL};
use super::BleController;
use crate::config::ble::MAX_SERVICES;
use crate::config::radar::MAX_NOTIFICATION_SIZE;
use crate::config::source::MAX_IDENTITY_LEN;
use crate::config::timing::SCAN_TIMEOUT_MS;
use crate::config::BleUuid;
use crate::source::{BleError, SourceBle};
use core::sync::atomic::{AtomicBool, Ordering};
use embassy_futures::select::{select3, Either3};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{with_timeout, Duration};
use heapless::{String, Vec};
use log::{debug, info, warn};
use trouble_host::prelude::*;
use trouble_host::scan::Scanner;

/// Longest characteristic write forwarded to the sensor
pub const MAX_WRITE_LEN: usize = 8;

/// Characteristic slots per link
const MAX_CHARACTERISTICS: usize = 6;

/// Notification listeners per link
const MAX_LISTENERS: usize = 2;

type Client<'a> = GattClient<'a, BleController, DefaultPacketPool, MAX_SERVICES>;
type SourceCentral<'a> = Central<'a, BleController, DefaultPacketPool>;
type SourceConnection<'a> = Connection<'a, DefaultPacketPool>;

/// One operation requested by [`ChannelCentral`]
pub enum CentralRequest {
    Scan {
        name: String<MAX_NAME_LEN>,
        timeout_ms: u32,
    },
    Connect(Address),
    Disconnect,
    Service(BleUuid),
    Characteristic {
        service: u8,
        uuid: BleUuid,
    },
    Read(u8),
    Write {
        characteristic: u8,
        data: Vec<u8, MAX_WRITE_LEN>,
    },
    Subscribe(u8),
    Notified {
        characteristic: u8,
        timeout_ms: u32,
    },
}

/// The actor's answer to one request
pub enum CentralResponse {
    Done,
    Found(Option<Address>),
    /// Slot of a looked up service or characteristic
    Slot(Option<u8>),
    Value(Vec<u8, MAX_IDENTITY_LEN>),
    Notification(Option<Vec<u8, MAX_NOTIFICATION_SIZE>>),
    Failed(BleError),
}

pub static REQUEST_CHANNEL: Channel<CriticalSectionRawMutex, CentralRequest, 1> = Channel::new();
pub static RESPONSE_CHANNEL: Channel<CriticalSectionRawMutex, CentralResponse, 1> = Channel::new();

/// Set while a GATT client is up on a connection
static LINK_UP: AtomicBool = AtomicBool::new(false);

/// Set between receiving a request and answering it
static REQUEST_PENDING: AtomicBool = AtomicBool::new(false);

/// Forget any state left over from a previous BLE session
pub fn reset() {
    REQUEST_CHANNEL.clear();
    RESPONSE_CHANNEL.clear();
    SCAN_CHANNEL.clear();
    LINK_UP.store(false, Ordering::Relaxed);
    REQUEST_PENDING.store(false, Ordering::Relaxed);
}

async fn receive_request() -> CentralRequest {
    let request = REQUEST_CHANNEL.receive().await;
    REQUEST_PENDING.store(true, Ordering::Relaxed);
    request
}

async fn respond(response: CentralResponse) {
    REQUEST_PENDING.store(false, Ordering::Relaxed);
    RESPONSE_CHANNEL.send(response).await;
}

/// Serve central requests forever
pub async fn central_actor<'stack>(
    mut central: SourceCentral<'stack>,
    stack: &'stack Stack<'stack, BleController, DefaultPacketPool>,
) {
    loop {
        match receive_request().await {
            CentralRequest::Scan { name, timeout_ms } => {
                let (response, returned) = scan(central, &name, timeout_ms).await;
                central = returned;
                respond(response).await;
            }
            CentralRequest::Connect(address) => match connect(&mut central, address).await {
                Ok(connection) => run_link(stack, connection).await,
                Err(e) => respond(CentralResponse::Failed(e)).await,
            },
            CentralRequest::Disconnect => respond(CentralResponse::Done).await,
            _ => respond(CentralResponse::Failed(BleError::NotConnected)).await,
        }
    }
}

async fn scan<'stack>(
    central: SourceCentral<'stack>,
    name: &str,
    timeout_ms: u32,
) -> (CentralResponse, SourceCentral<'stack>) {
    let mut scanner = Scanner::new(central);
    let config = ScanConfig {
        active: true,
        interval: Duration::from_secs(1),
        window: Duration::from_secs(1),
        ..Default::default()
    };

    let response = match scanner.scan(&config).await {
        Ok(_session) => {
            SCAN_CHANNEL.clear();
            let timeout = Duration::from_millis(u64::from(timeout_ms));
            match with_timeout(timeout, wait_for_name(name)).await {
                Ok(address) => {
                    info!("[Central] Device found: {:?}", address.addr);
                    CentralResponse::Found(Some(address))
                }
                Err(_) => CentralResponse::Found(None),
            }
        }
        Err(e) => {
            warn!("[Central] Could not start scan: {:?}", e);
            CentralResponse::Failed(BleError::ScanFailed)
        }
    };

    (response, scanner.into_inner())
}

async fn wait_for_name(name: &str) -> Address {
    loop {
        let report = SCAN_CHANNEL.receive().await;
        if report.name.as_str() == name {
            return report.address;
        }
    }
}

async fn connect<'stack>(
    central: &mut SourceCentral<'stack>,
    address: Address,
) -> Result<SourceConnection<'stack>, BleError> {
    let config = ConnectConfig {
        connect_params: Default::default(),
        scan_config: ScanConfig {
            filter_accept_list: &[(address.kind, &address.addr)],
            ..Default::default()
        },
    };

    let timeout = Duration::from_millis(u64::from(SCAN_TIMEOUT_MS));
    match with_timeout(timeout, central.connect(&config)).await {
        Ok(Ok(connection)) => Ok(connection),
        Ok(Err(e)) => {
            warn!("[Central] Error instantiating source connection: {:?}", e);
            Err(BleError::ConnectFailed)
        }
        Err(_) => Err(BleError::ConnectFailed),
    }
}

/// Hold the link until it drops or a disconnect is requested
async fn run_link<'stack>(
    stack: &'stack Stack<'stack, BleController, DefaultPacketPool>,
    connection: SourceConnection<'stack>,
) {
    let client = match Client::new(stack, &connection).await {
        Ok(client) => client,
        Err(e) => {
            warn!("[Central] Error instantiating source client: {:?}", e);
            connection.disconnect();
            respond(CentralResponse::Failed(BleError::ConnectFailed)).await;
            return;
        }
    };

    LINK_UP.store(true, Ordering::Relaxed);
    respond(CentralResponse::Done).await;

    match select3(
        client.task(),
        wait_disconnected(&connection),
        serve_link_requests(&client, &connection),
    )
    .await
    {
        Either3::First(Err(e)) => warn!("[Central] Client runner failed: {:?}", e),
        Either3::First(Ok(())) => info!("[Central] Client runner has ended"),
        Either3::Second(()) => {}
        Either3::Third(()) => info!("[Central] Link closed on request"),
    }

    LINK_UP.store(false, Ordering::Relaxed);

    if REQUEST_PENDING.load(Ordering::Relaxed) {
        respond(CentralResponse::Failed(BleError::Disconnected)).await;
    }
}

async fn wait_disconnected(connection: &SourceConnection<'_>) {
    loop {
        if let ConnectionEvent::Disconnected { reason } = connection.next().await {
            info!("[Central] Disconnected from source device, reason: {:?}", reason);
            return;
        }
    }
}

/// Answer requests against an open link
///
/// Returns once a disconnect has been requested and answered.
async fn serve_link_requests<'c>(client: &'c Client<'_>, connection: &SourceConnection<'_>) {
    let mut services: Vec<ServiceHandle, MAX_SERVICES> = Vec::new();
    let mut characteristics: Vec<Characteristic<u8>, MAX_CHARACTERISTICS> = Vec::new();
    let mut listeners: Vec<_, MAX_LISTENERS> = Vec::new();

    loop {
        let response = match receive_request().await {
            CentralRequest::Scan { .. } => CentralResponse::Failed(BleError::ScanFailed),
            CentralRequest::Connect(_) => CentralResponse::Failed(BleError::ConnectFailed),
            CentralRequest::Disconnect => {
                connection.disconnect();
                respond(CentralResponse::Done).await;
                return;
            }
            CentralRequest::Service(uuid) => {
                match client.services_by_uuid(&Uuid::from(uuid)).await {
                    Ok(found) => match found.first() {
                        Some(service) => match services.push(service.clone()) {
                            Ok(()) => CentralResponse::Slot(Some(slot(services.len()))),
                            Err(_) => CentralResponse::Failed(BleError::DiscoveryFailed),
                        },
                        None => CentralResponse::Slot(None),
                    },
                    Err(e) => {
                        warn!("[Central] Service discovery failed: {:?}", e);
                        CentralResponse::Failed(BleError::DiscoveryFailed)
                    }
                }
            }
            CentralRequest::Characteristic { service, uuid } => {
                match services.get(usize::from(service)) {
                    Some(service) => {
                        match client.characteristic_by_uuid(service, &Uuid::from(uuid)).await {
                            Ok(ch) => match characteristics.push(ch) {
                                Ok(()) => CentralResponse::Slot(Some(slot(characteristics.len()))),
                                Err(_) => CentralResponse::Failed(BleError::DiscoveryFailed),
                            },
                            Err(e) => {
                                debug!("[Central] Characteristic {:?} not found: {:?}", uuid, e);
                                CentralResponse::Slot(None)
                            }
                        }
                    }
                    None => CentralResponse::Failed(BleError::DiscoveryFailed),
                }
            }
            CentralRequest::Read(index) => match characteristics.get(usize::from(index)) {
                Some(ch) => {
                    let mut buf = [0u8; MAX_IDENTITY_LEN];
                    match client.read_characteristic(ch, &mut buf).await {
                        Ok(len) => {
                            let mut value = Vec::new();
                            match value.extend_from_slice(&buf[..len.min(buf.len())]) {
                                Ok(()) => CentralResponse::Value(value),
                                Err(_) => CentralResponse::Failed(BleError::BufferTooSmall),
                            }
                        }
                        Err(e) => {
                            warn!("[Central] Read failed: {:?}", e);
                            CentralResponse::Failed(BleError::ReadFailed)
                        }
                    }
                }
                None => CentralResponse::Failed(BleError::ReadFailed),
            },
            CentralRequest::Write {
                characteristic,
                data,
            } => match characteristics.get(usize::from(characteristic)) {
                Some(ch) => match client.write_characteristic(ch, &data).await {
                    Ok(()) => CentralResponse::Done,
                    Err(e) => {
                        warn!("[Central] Write failed: {:?}", e);
                        CentralResponse::Failed(BleError::WriteFailed)
                    }
                },
                None => CentralResponse::Failed(BleError::WriteFailed),
            },
            CentralRequest::Subscribe(index) => match characteristics.get(usize::from(index)) {
                Some(ch) => match client.subscribe(ch, false).await {
                    Ok(listener) => {
                        listeners.retain(|(i, _)| *i != index);
                        match listeners.push((index, listener)) {
                            Ok(()) => CentralResponse::Done,
                            Err(_) => CentralResponse::Failed(BleError::SubscribeFailed),
                        }
                    }
                    Err(e) => {
                        warn!("[Central] Subscribe failed: {:?}", e);
                        CentralResponse::Failed(BleError::SubscribeFailed)
                    }
                },
                None => CentralResponse::Failed(BleError::SubscribeFailed),
            },
            CentralRequest::Notified {
                characteristic,
                timeout_ms,
            } => match listeners.iter_mut().find(|(i, _)| *i == characteristic) {
                Some((_, listener)) => {
                    let timeout = Duration::from_millis(u64::from(timeout_ms));
                    match with_timeout(timeout, listener.next()).await {
                        Ok(notification) => {
                            let mut data = Vec::new();
                            match data.extend_from_slice(notification.as_ref()) {
                                Ok(()) => CentralResponse::Notification(Some(data)),
                                Err(_) => CentralResponse::Failed(BleError::BufferTooSmall),
                            }
                        }
                        Err(_) => CentralResponse::Notification(None),
                    }
                }
                None => CentralResponse::Failed(BleError::SubscribeFailed),
            },
        };

        respond(response).await;
    }
}

/// Index of the last pushed slot
fn slot(len: usize) -> u8 {
    len.saturating_sub(1) as u8
}

/// [`SourceBle`] over the central actor's channels
pub struct ChannelCentral;

impl ChannelCentral {
    async fn request(&mut self, request: CentralRequest) -> CentralResponse {
        REQUEST_CHANNEL.send(request).await;
        RESPONSE_CHANNEL.receive().await
    }
}

/// Error carried by an unexpected response
fn failure(response: CentralResponse, fallback: BleError) -> BleError {
    match response {
        CentralResponse::Failed(e) => e,
        _ => fallback,
    }
}

fn copy_into(value: &[u8], buf: &mut [u8]) -> Result<usize, BleError> {
    let dest = buf.get_mut(..value.len()).ok_or(BleError::BufferTooSmall)?;
    dest.copy_from_slice(value);
    Ok(value.len())
}

impl SourceBle for ChannelCentral {
    type Device = Address;
    type Service = u8;
    type Characteristic = u8;

    async fn scan(&mut self, name: &str, timeout_ms: u32) -> Result<Option<Address>, BleError> {
        let mut target = String::new();
        target.push_str(name).map_err(|_| BleError::ScanFailed)?;

        match self
            .request(CentralRequest::Scan {
                name: target,
                timeout_ms,
            })
            .await
        {
            CentralResponse::Found(address) => Ok(address),
            other => Err(failure(other, BleError::ScanFailed)),
        }
    }

    async fn connect(&mut self, device: &Address) -> Result<(), BleError> {
        match self.request(CentralRequest::Connect(*device)).await {
            CentralResponse::Done => Ok(()),
            other => Err(failure(other, BleError::ConnectFailed)),
        }
    }

    async fn disconnect(&mut self) -> Result<(), BleError> {
        match self.request(CentralRequest::Disconnect).await {
            CentralResponse::Done => Ok(()),
            other => Err(failure(other, BleError::NotConnected)),
        }
    }

    fn is_connected(&self) -> bool {
        LINK_UP.load(Ordering::Relaxed)
    }

    async fn service(&mut self, uuid: BleUuid) -> Result<Option<u8>, BleError> {
        match self.request(CentralRequest::Service(uuid)).await {
            CentralResponse::Slot(slot) => Ok(slot),
            other => Err(failure(other, BleError::DiscoveryFailed)),
        }
    }

    async fn characteristic(&mut self, service: &u8, uuid: BleUuid) -> Result<Option<u8>, BleError> {
        match self
            .request(CentralRequest::Characteristic {
                service: *service,
                uuid,
            })
            .await
        {
            CentralResponse::Slot(slot) => Ok(slot),
            other => Err(failure(other, BleError::DiscoveryFailed)),
        }
    }

    async fn read(&mut self, characteristic: &u8, buf: &mut [u8]) -> Result<usize, BleError> {
        match self.request(CentralRequest::Read(*characteristic)).await {
            CentralResponse::Value(value) => copy_into(&value, buf),
            other => Err(failure(other, BleError::ReadFailed)),
        }
    }

    async fn write(&mut self, characteristic: &u8, data: &[u8]) -> Result<(), BleError> {
        let data = Vec::from_slice(data).map_err(|_| BleError::WriteFailed)?;
        match self
            .request(CentralRequest::Write {
                characteristic: *characteristic,
                data,
            })
            .await
        {
            CentralResponse::Done => Ok(()),
            other => Err(failure(other, BleError::WriteFailed)),
        }
    }

    async fn subscribe(&mut self, characteristic: &u8) -> Result<(), BleError> {
        match self.request(CentralRequest::Subscribe(*characteristic)).await {
            CentralResponse::Done => Ok(()),
            other => Err(failure(other, BleError::SubscribeFailed)),
        }
    }

    async fn notified(
        &mut self,
        characteristic: &u8,
        buf: &mut [u8],
        timeout_ms: u32,
    ) -> Result<Option<usize>, BleError> {
        match self
            .request(CentralRequest::Notified {
                characteristic: *characteristic,
                timeout_ms,
            })
            .await
        {
            CentralResponse::Notification(Some(data)) => copy_into(&data, buf).map(Some),
            CentralResponse::Notification(None) => Ok(None),
            other => Err(failure(other, BleError::Disconnected)),
        }
    }
}
