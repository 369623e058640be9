//! Advertising report handler for the central role
//!
//! Runs inside the BLE runner. Every report carrying a local name is
//! forwarded to the central actor, which filters by the name it is
//! scanning for.

use crate::adv;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use heapless::String;
use log::debug;
use trouble_host::prelude::*;
use trouble_host::scan::LeAdvReportsIter;

/// Longest advertised name kept for filtering
pub const MAX_NAME_LEN: usize = 32;

/// A named advertiser seen during a scan
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub address: Address,
    pub name: String<MAX_NAME_LEN>,
}

/// Named advertisers seen by the runner, drained by the central actor
pub static SCAN_CHANNEL: Channel<CriticalSectionRawMutex, ScanReport, 8> = Channel::new();

pub struct ScanEventHandler;

impl EventHandler for ScanEventHandler {
    fn on_adv_reports(&self, mut it: LeAdvReportsIter<'_>) {
        while let Some(Ok(report)) = it.next() {
            let Some(local_name) = adv::local_name(report.data) else {
                continue;
            };

            let mut name = String::new();
            if name.push_str(local_name).is_err() {
                continue;
            }

            let address = Address {
                kind: report.addr_kind,
                addr: report.addr,
            };
            // Full channel means the actor is not scanning; drop the report
            if SCAN_CHANNEL.try_send(ScanReport { address, name }).is_err() {
                debug!("[Central] Scan report dropped");
            }
        }
    }
}
