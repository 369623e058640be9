//! Notification relay
//!
//! Holds the latest radar pages and battery level and republishes them to
//! the downstream GATT state. Each radar page carries its own staleness
//! timer; the relay's owner drives expiry by calling
//! [`NotificationRelay::expire`] from its loop, and every radar publish
//! resets expired pages first.

pub mod codec;
pub mod staleness;

pub use codec::{decode_battery, decode_radar, DecodeError, PageId, RadarFrame};
pub use staleness::StalenessTimer;

use crate::config::radar::{MERGED_SIZE, PAGE_SIZE};
use crate::state::BridgeSink;
use log::{debug, info, warn};

/// Latest known value of one radar page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RadarPage {
    pub page: PageId,
    pub payload: [u8; PAGE_SIZE],
    /// None until the first frame, and again after expiry
    pub last_update_ms: Option<u64>,
}

impl RadarPage {
    const fn new(page: PageId) -> Self {
        Self {
            page,
            payload: page.default_payload(),
            last_update_ms: None,
        }
    }

    fn reset(&mut self) {
        self.payload = self.page.default_payload();
        self.last_update_ms = None;
    }
}

/// Last battery level published downstream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatteryLevel {
    /// None while downstream shows no value
    pub percent: Option<u8>,
    pub last_update_ms: Option<u64>,
}

/// Latest-value store between the sensor and the downstream server
pub struct NotificationRelay {
    pages: [RadarPage; 2],
    timers: [StalenessTimer; 2],
    battery: BatteryLevel,
}

impl NotificationRelay {
    /// Create a relay whose pages expire after `page_timeout_ms`
    pub const fn new(page_timeout_ms: u32) -> Self {
        Self {
            pages: [RadarPage::new(PageId::Page1), RadarPage::new(PageId::Page2)],
            timers: [
                StalenessTimer::new(page_timeout_ms),
                StalenessTimer::new(page_timeout_ms),
            ],
            battery: BatteryLevel {
                percent: None,
                last_update_ms: None,
            },
        }
    }

    pub fn page(&self, page: PageId) -> &RadarPage {
        &self.pages[page.index()]
    }

    pub fn timer(&self, page: PageId) -> &StalenessTimer {
        &self.timers[page.index()]
    }

    pub fn battery(&self) -> &BatteryLevel {
        &self.battery
    }

    /// Page 1 followed by page 2
    pub fn merged_view(&self) -> [u8; MERGED_SIZE] {
        let mut merged = [0u8; MERGED_SIZE];
        merged[..PAGE_SIZE].copy_from_slice(&self.pages[0].payload);
        merged[PAGE_SIZE..].copy_from_slice(&self.pages[1].payload);
        merged
    }

    /// Store a decoded page, re-arm its timer and publish the merged view
    pub fn apply_radar<S: BridgeSink>(&mut self, frame: RadarFrame, now_ms: u64, sink: &mut S) {
        let index = frame.page.index();

        // Cancel before overwrite so a pending expiry can never clobber this frame
        self.timers[index].cancel();
        self.pages[index].payload = frame.payload;
        self.pages[index].last_update_ms = Some(now_ms);
        self.timers[index].arm(now_ms);

        // The other page may be past its deadline without expire() having run
        self.reset_expired(now_ms);
        sink.publish_radar(&self.merged_view());
    }

    /// Publish a battery level if it differs from the last published one
    ///
    /// Returns true if a publish happened.
    pub fn apply_battery<S: BridgeSink>(&mut self, percent: u8, now_ms: u64, sink: &mut S) -> bool {
        if self.battery.percent == Some(percent) {
            return false;
        }

        if percent > 100 {
            warn!("[Relay] Battery level {} out of range, forwarding unchanged", percent);
        }

        self.battery = BatteryLevel {
            percent: Some(percent),
            last_update_ms: Some(now_ms),
        };
        sink.publish_battery(&[percent]);
        info!("[Relay] Battery level updated: {}%", percent);
        true
    }

    /// Decode and apply a raw radar notification
    ///
    /// Rejected frames are logged and leave all state untouched.
    pub fn on_radar_notification<S: BridgeSink>(&mut self, raw: &[u8], now_ms: u64, sink: &mut S) {
        match decode_radar(raw) {
            Ok(frame) => self.apply_radar(frame, now_ms, sink),
            Err(e) => warn!(
                "[Relay] Non-radar frame received ({:?}, length {}): {:02x?}",
                e,
                raw.len(),
                raw
            ),
        }
    }

    /// Decode and apply a raw battery notification or read
    pub fn on_battery_notification<S: BridgeSink>(
        &mut self,
        raw: &[u8],
        now_ms: u64,
        sink: &mut S,
    ) {
        match decode_battery(raw) {
            Ok(percent) => {
                self.apply_battery(percent, now_ms, sink);
            }
            Err(e) => warn!("[Relay] Unexpected battery data ({:?})", e),
        }
    }

    /// Reset every page whose timer has fired
    ///
    /// Republishes the merged view if any page expired. Returns true in
    /// that case.
    pub fn expire<S: BridgeSink>(&mut self, now_ms: u64, sink: &mut S) -> bool {
        let expired = self.reset_expired(now_ms);
        if expired {
            sink.publish_radar(&self.merged_view());
        }
        expired
    }

    fn reset_expired(&mut self, now_ms: u64) -> bool {
        let mut expired = false;

        for (timer, page) in self.timers.iter_mut().zip(self.pages.iter_mut()) {
            if timer.fire(now_ms) {
                debug!("[Relay] Radar page {:?} expired", page.page);
                page.reset();
                expired = true;
            }
        }

        expired
    }

    /// Put both downstream characteristics into the "no data" state
    ///
    /// The stored pages survive; the published battery level is forgotten
    /// so the next reading is always published.
    pub fn clear_downstream<S: BridgeSink>(&mut self, sink: &mut S) {
        sink.publish_radar(&[]);
        sink.publish_battery(&[]);
        self.battery = BatteryLevel::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::mock::RecordingSink;

    const TIMEOUT: u32 = 2_000;

    fn radar_raw(tag: u8, fill: u8) -> [u8; 11] {
        let mut raw = [fill; 11];
        raw[..3].copy_from_slice(&[0xA0, 0xA1, 0xA2]);
        raw[3] = tag;
        raw
    }

    fn merged(p1: [u8; PAGE_SIZE], p2: [u8; PAGE_SIZE]) -> [u8; MERGED_SIZE] {
        let mut m = [0u8; MERGED_SIZE];
        m[..PAGE_SIZE].copy_from_slice(&p1);
        m[PAGE_SIZE..].copy_from_slice(&p2);
        m
    }

    #[test]
    fn test_initial_merged_view_is_default_pages() {
        let relay = NotificationRelay::new(TIMEOUT);
        assert_eq!(
            relay.merged_view(),
            merged(PageId::Page1.default_payload(), PageId::Page2.default_payload())
        );
    }

    #[test]
    fn test_radar_frame_publishes_merged_view() {
        let mut relay = NotificationRelay::new(TIMEOUT);
        let mut sink = RecordingSink::new();

        relay.on_radar_notification(&radar_raw(0x31, 0x05), 100, &mut sink);

        let published = sink.radar_publishes();
        assert_eq!(published.len(), 1);
        let mut p2 = [0x05u8; PAGE_SIZE];
        p2[0] = 0x31;
        assert_eq!(
            published[0].as_slice(),
            &merged(PageId::Page1.default_payload(), p2)
        );
        assert_eq!(relay.page(PageId::Page2).last_update_ms, Some(100));
    }

    #[test]
    fn test_page_independence_under_interleaving() {
        let mut relay = NotificationRelay::new(TIMEOUT);
        let mut sink = RecordingSink::new();

        relay.on_radar_notification(&radar_raw(0x30, 0x01), 0, &mut sink);
        relay.on_radar_notification(&radar_raw(0x31, 0x02), 10, &mut sink);
        relay.on_radar_notification(&radar_raw(0x30, 0x03), 20, &mut sink);

        let mut p1 = [0x03u8; PAGE_SIZE];
        p1[0] = 0x30;
        let mut p2 = [0x02u8; PAGE_SIZE];
        p2[0] = 0x31;

        let published = sink.radar_publishes();
        assert_eq!(published.len(), 3);
        assert_eq!(published[2].as_slice(), &merged(p1, p2));
    }

    #[test]
    fn test_page_expires_after_window() {
        let mut relay = NotificationRelay::new(TIMEOUT);
        let mut sink = RecordingSink::new();

        relay.on_radar_notification(&radar_raw(0x30, 0x07), 1_000, &mut sink);
        relay.on_radar_notification(&radar_raw(0x31, 0x08), 2_500, &mut sink);

        assert!(!relay.expire(2_999, &mut sink));
        assert!(relay.expire(3_000, &mut sink));

        // Page 1 expired, page 2 still fresh
        assert_eq!(relay.page(PageId::Page1).payload, PageId::Page1.default_payload());
        assert_eq!(relay.page(PageId::Page1).last_update_ms, None);
        assert_eq!(relay.page(PageId::Page2).payload[1], 0x08);

        let published = sink.radar_publishes();
        assert_eq!(published.len(), 3);
        assert_eq!(&published[2][..PAGE_SIZE], &PageId::Page1.default_payload());

        assert!(relay.expire(4_500, &mut sink));
        assert_eq!(relay.page(PageId::Page2).payload, PageId::Page2.default_payload());
    }

    #[test]
    fn test_fresh_frame_cancels_pending_expiry() {
        let mut relay = NotificationRelay::new(TIMEOUT);
        let mut sink = RecordingSink::new();

        relay.on_radar_notification(&radar_raw(0x30, 0x01), 0, &mut sink);
        relay.on_radar_notification(&radar_raw(0x30, 0x02), 1_999, &mut sink);

        assert!(!relay.expire(2_000, &mut sink));
        assert_eq!(relay.page(PageId::Page1).payload[1], 0x02);
        assert_eq!(relay.timer(PageId::Page1).deadline_ms(), Some(3_999));
    }

    #[test]
    fn test_frame_after_other_page_deadline_publishes_default() {
        let mut relay = NotificationRelay::new(TIMEOUT);
        let mut sink = RecordingSink::new();

        relay.on_radar_notification(&radar_raw(0x31, 0xAB), 0, &mut sink);
        relay.on_radar_notification(&radar_raw(0x30, 0x11), 2_050, &mut sink);

        let mut p1 = [0x11u8; PAGE_SIZE];
        p1[0] = 0x30;
        let published = sink.radar_publishes();
        assert_eq!(published.len(), 2);
        assert_eq!(
            published[1].as_slice(),
            &merged(p1, PageId::Page2.default_payload())
        );
        assert!(!relay.timer(PageId::Page2).is_armed());
        assert!(!relay.expire(2_100, &mut sink));
    }

    #[test]
    fn test_page1_frame_does_not_touch_page2_timer() {
        let mut relay = NotificationRelay::new(TIMEOUT);
        let mut sink = RecordingSink::new();

        relay.on_radar_notification(&radar_raw(0x31, 0x01), 0, &mut sink);
        relay.on_radar_notification(&radar_raw(0x30, 0x01), 1_500, &mut sink);

        assert_eq!(relay.timer(PageId::Page2).deadline_ms(), Some(2_000));
        assert!(relay.expire(2_000, &mut sink));
        assert_eq!(relay.page(PageId::Page2).payload, PageId::Page2.default_payload());
        assert_eq!(relay.page(PageId::Page1).payload[1], 0x01);
    }

    #[test]
    fn test_rejected_frames_change_nothing() {
        let mut relay = NotificationRelay::new(TIMEOUT);
        let mut sink = RecordingSink::new();
        relay.on_radar_notification(&radar_raw(0x30, 0x09), 0, &mut sink);
        sink.clear();
        let before = relay.merged_view();

        relay.on_radar_notification(&[0x30, 0x31, 0x30], 10, &mut sink);
        relay.on_radar_notification(&radar_raw(0x7F, 0x01), 20, &mut sink);

        assert!(sink.events().is_empty());
        assert_eq!(relay.merged_view(), before);
        assert_eq!(relay.page(PageId::Page1).last_update_ms, Some(0));
    }

    #[test]
    fn test_battery_dedup() {
        let mut relay = NotificationRelay::new(TIMEOUT);
        let mut sink = RecordingSink::new();

        for (t, level) in [70u8, 70, 71, 71, 70].into_iter().enumerate() {
            relay.on_battery_notification(&[level], t as u64, &mut sink);
        }

        let published = sink.battery_publishes();
        assert_eq!(published.len(), 3);
        assert_eq!(published[0].as_slice(), &[70]);
        assert_eq!(published[1].as_slice(), &[71]);
        assert_eq!(published[2].as_slice(), &[70]);
    }

    #[test]
    fn test_battery_out_of_range_forwarded() {
        let mut relay = NotificationRelay::new(TIMEOUT);
        let mut sink = RecordingSink::new();

        assert!(relay.apply_battery(180, 0, &mut sink));
        assert_eq!(sink.battery_publishes()[0].as_slice(), &[180]);
    }

    #[test]
    fn test_malformed_battery_ignored() {
        let mut relay = NotificationRelay::new(TIMEOUT);
        let mut sink = RecordingSink::new();

        relay.on_battery_notification(&[50, 1], 0, &mut sink);
        relay.on_battery_notification(&[], 0, &mut sink);

        assert!(sink.events().is_empty());
        assert_eq!(relay.battery().percent, None);
    }

    #[test]
    fn test_clear_downstream_publishes_empty_and_reseeds_battery() {
        let mut relay = NotificationRelay::new(TIMEOUT);
        let mut sink = RecordingSink::new();

        relay.on_battery_notification(&[64], 0, &mut sink);
        relay.on_radar_notification(&radar_raw(0x30, 0x04), 0, &mut sink);
        sink.clear();

        relay.clear_downstream(&mut sink);
        assert_eq!(sink.radar_publishes().len(), 1);
        assert!(sink.radar_publishes()[0].is_empty());
        assert_eq!(sink.battery_publishes().len(), 1);
        assert!(sink.battery_publishes()[0].is_empty());

        // Pages persist across the clear
        assert_eq!(relay.page(PageId::Page1).payload[1], 0x04);

        // Same level as before the clear is published again
        assert!(relay.apply_battery(64, 10, &mut sink));
    }
}
