//! BLE task running both roles
//!
//! Builds the host stack once, then runs one session per start: the
//! trouble-host runner, the central actor, the link manager and the
//! downstream server, all multiplexed on this task. A session ends when
//! the link manager sees the shutdown flag; the next button press starts
//! a fresh one on a rebuilt host.

use core::sync::atomic::Ordering;
use embassy_futures::select::{select4, Either4};
use embassy_time::Delay;
use log::{error, info};
use trouble_host::prelude::*;

use crate::ble::central::reset as reset_central;
use crate::ble::{central_actor, BleController, ChannelCentral, ScanEventHandler, Server, TroublePeripheral};
use crate::config;
use crate::config::ble::{CONNECTIONS_MAX, L2CAP_CHANNELS_MAX};
use crate::downstream::PeripheralServer;
use crate::signals::{publish_initial_state, EmbassyClock, WatchSink, BUTTON_PRESSED, SHUTDOWN};
use crate::source::LinkManager;

/// Main BLE task
///
/// `address` is the bridge's random static address.
pub async fn ble_task(controller: BleController, address: [u8; 6]) {
    let mut resources: HostResources<DefaultPacketPool, CONNECTIONS_MAX, L2CAP_CHANNELS_MAX> =
        HostResources::new();

    let stack = trouble_host::new(controller, &mut resources)
        .set_random_address(Address::random(address));

    let gap = GapConfig::Peripheral(PeripheralConfig {
        name: config::peripheral::NAME,
        appearance: &appearance::UNKNOWN,
    });
    let server: Server = match Server::new_with_config(gap) {
        Ok(s) => s,
        Err(e) => {
            error!("[Main] Failed to set up GATT server: {:?}", e);
            return;
        }
    };

    publish_initial_state();
    info!("[Main] BLE stack ready");

    loop {
        while SHUTDOWN.load(Ordering::Relaxed) {
            BUTTON_PRESSED.wait().await;
        }

        info!("[Main] Starting bridge session");
        reset_central();

        let Host {
            central,
            peripheral,
            mut runner,
            ..
        } = stack.build();

        let mut link = LinkManager::new(ChannelCentral, Delay, EmbassyClock, WatchSink);
        let mut downstream = PeripheralServer::new(TroublePeripheral::new(peripheral, &server), Delay);

        match select4(
            runner.run_with_handler(&ScanEventHandler),
            central_actor(central, &stack),
            link.run(&SHUTDOWN),
            downstream.run(&SHUTDOWN),
        )
        .await
        {
            Either4::First(Ok(())) => info!("[Main] Runner task ended"),
            Either4::First(Err(e)) => error!("[Main] Runner task encountered an error: {:?}", e),
            Either4::Second(()) => info!("[Main] Central actor ended"),
            Either4::Third(()) => info!("[Main] Link manager stopped"),
            Either4::Fourth(()) => info!("[Main] Downstream server stopped"),
        }

        reset_central();
        publish_initial_state();
        info!("[Main] Bridge session ended");
    }
}
