//! trouble-host implementation of [`BlePeripheral`]
//!
//! Serving a client means answering its GATT requests while forwarding
//! every radar and battery update from the signal watches as a
//! notification.

use super::server::Server;
use super::BleController;
use crate::config::peripheral::RADAR_SERVICE;
use crate::downstream::{BlePeripheral, PeripheralError};
use crate::signals::{BATTERY_WATCH, RADAR_WATCH};
use embassy_futures::select::{select3, Either3};
use embassy_time::Duration;
use log::{error, info, warn};
use trouble_host::prelude::*;

/// Legacy advertising and scan response payload size
const MAX_ADV_LEN: usize = 31;

/// Peripheral role bound to the bridge GATT server
pub struct TroublePeripheral<'stack, 'server> {
    peripheral: Peripheral<'stack, BleController, DefaultPacketPool>,
    server: &'server Server<'stack>,
}

impl<'stack, 'server> TroublePeripheral<'stack, 'server> {
    pub fn new(
        peripheral: Peripheral<'stack, BleController, DefaultPacketPool>,
        server: &'server Server<'stack>,
    ) -> Self {
        Self { peripheral, server }
    }
}

impl<'stack, 'server> BlePeripheral for TroublePeripheral<'stack, 'server> {
    type Client = GattConnection<'stack, 'server, DefaultPacketPool>;

    async fn advertise(&mut self, name: &str, interval_ms: u32) -> Result<Self::Client, PeripheralError> {
        let mut adv_data = [0u8; MAX_ADV_LEN];
        let len = AdStructure::encode_slice(
            &[
                AdStructure::Flags(LE_GENERAL_DISCOVERABLE | BR_EDR_NOT_SUPPORTED),
                AdStructure::ServiceUuids16(&[service::BATTERY.to_le_bytes()]),
                AdStructure::CompleteLocalName(name.as_bytes()),
            ],
            &mut adv_data,
        )
        .map_err(|_| PeripheralError::AdvertiseFailed)?;

        // The 128-bit radar service does not fit next to the name
        let mut scan_data = [0u8; MAX_ADV_LEN];
        let scan_len = AdStructure::encode_slice(
            &[AdStructure::ServiceUuids128(&[RADAR_SERVICE.as_u128().to_le_bytes()])],
            &mut scan_data,
        )
        .map_err(|_| PeripheralError::AdvertiseFailed)?;

        let interval = Duration::from_millis(u64::from(interval_ms));
        let params = AdvertisementParameters {
            interval_min: interval,
            interval_max: interval,
            ..Default::default()
        };

        let advertiser = self
            .peripheral
            .advertise(
                &params,
                Advertisement::ConnectableScannableUndirected {
                    adv_data: &adv_data[..len],
                    scan_data: &scan_data[..scan_len],
                },
            )
            .await
            .map_err(|e| {
                warn!("[Peripheral] Advertiser error: {:?}", e);
                PeripheralError::AdvertiseFailed
            })?;

        let connection = advertiser.accept().await.map_err(|e| {
            warn!("[Peripheral] Accept error: {:?}", e);
            PeripheralError::AcceptFailed
        })?;

        connection.with_attribute_server(self.server).map_err(|e| {
            warn!("[Peripheral] GATT connection error: {:?}", e);
            PeripheralError::AcceptFailed
        })
    }

    async fn serve(&mut self, client: Self::Client) -> Result<(), PeripheralError> {
        let server = self.server;
        let mut radar = RADAR_WATCH.receiver().ok_or(PeripheralError::SessionFailed)?;
        let mut battery = BATTERY_WATCH.receiver().ok_or(PeripheralError::SessionFailed)?;

        // A client connecting mid-session reads the current view
        if let Some(value) = radar.try_get() {
            if let Err(e) = server.radar_service.radar.set(&**server, &value) {
                warn!("[Peripheral] Could not seed radar value: {:?}", e);
            }
        }
        if let Some(value) = battery.try_get() {
            if let Err(e) = server.battery_service.level.set(&**server, &value) {
                warn!("[Peripheral] Could not seed battery value: {:?}", e);
            }
        }

        let radar_updates = async {
            loop {
                let value = radar.changed().await;
                if let Err(e) = server.radar_service.radar.notify(&client, &value).await {
                    error!("[Peripheral] Could not send radar notification: {:?}", e);
                }
            }
        };

        let battery_updates = async {
            loop {
                let value = battery.changed().await;
                if let Err(e) = server.battery_service.level.notify(&client, &value).await {
                    error!("[Peripheral] Could not send battery notification: {:?}", e);
                }
            }
        };

        match select3(gatt_events(&client), radar_updates, battery_updates).await {
            Either3::First(()) => Ok(()),
            Either3::Second(()) | Either3::Third(()) => Err(PeripheralError::SessionFailed),
        }
    }
}

/// Answer GATT requests until the client disconnects
async fn gatt_events<P: PacketPool>(client: &GattConnection<'_, '_, P>) {
    loop {
        match client.next().await {
            GattConnectionEvent::Disconnected { reason } => {
                info!("[Peripheral] GATT connection closed: {:?}", reason);
                return;
            }
            GattConnectionEvent::Gatt { event } => match event.accept() {
                Ok(reply) => reply.send().await,
                Err(e) => warn!("[Peripheral] Error sending GATT response: {:?}", e),
            },
            _ => {}
        }
    }
}
