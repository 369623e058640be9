//! Frame codec for raw sensor notifications
//!
//! Stateless: turns notification payloads into typed radar pages and
//! battery percentages, or a [`DecodeError`] saying why it rejected them.

use crate::config::radar::{PAGE1_TAG, PAGE2_TAG, PAGE_SIZE, TAG_OFFSET};

/// Which of the two radar pages a frame carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageId {
    Page1,
    Page2,
}

impl PageId {
    /// Map a tag byte to its page
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            PAGE1_TAG => Some(Self::Page1),
            PAGE2_TAG => Some(Self::Page2),
            _ => None,
        }
    }

    pub const fn tag(self) -> u8 {
        match self {
            PageId::Page1 => PAGE1_TAG,
            PageId::Page2 => PAGE2_TAG,
        }
    }

    /// Slot index (page 1 first)
    pub const fn index(self) -> usize {
        match self {
            PageId::Page1 => 0,
            PageId::Page2 => 1,
        }
    }

    /// Payload a page reverts to when it expires: tag set, data zero
    pub const fn default_payload(self) -> [u8; PAGE_SIZE] {
        let mut payload = [0u8; PAGE_SIZE];
        payload[0] = self.tag();
        payload
    }
}

/// A decoded radar page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RadarFrame {
    pub page: PageId,
    /// Tag byte followed by the page data
    pub payload: [u8; PAGE_SIZE],
}

/// Why a notification was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Radar frame too short to carry a tag
    TooShort(usize),
    /// Byte at the tag offset is neither page tag
    UnknownPage(u8),
    /// Battery level must be exactly one byte
    BatteryLength(usize),
}

/// Decode a radar notification
///
/// The page starts at the tag offset; the leading bytes are dropped.
/// Short pages are zero-filled and long ones truncated so the payload is
/// always [`PAGE_SIZE`] bytes.
pub fn decode_radar(raw: &[u8]) -> Result<RadarFrame, DecodeError> {
    if raw.len() <= TAG_OFFSET {
        return Err(DecodeError::TooShort(raw.len()));
    }

    let tag = raw[TAG_OFFSET];
    let page = PageId::from_tag(tag).ok_or(DecodeError::UnknownPage(tag))?;

    let body = &raw[TAG_OFFSET..];
    let len = body.len().min(PAGE_SIZE);
    let mut payload = [0u8; PAGE_SIZE];
    payload[..len].copy_from_slice(&body[..len]);

    Ok(RadarFrame { page, payload })
}

/// Decode a battery notification into a percentage
///
/// Values above 100 are passed through unchanged.
pub fn decode_battery(raw: &[u8]) -> Result<u8, DecodeError> {
    match raw {
        [level] => Ok(*level),
        _ => Err(DecodeError::BatteryLength(raw.len())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_page1() {
        let raw = [0x01, 0x02, 0x03, 0x30, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77];
        let frame = decode_radar(&raw).unwrap();
        assert_eq!(frame.page, PageId::Page1);
        assert_eq!(frame.payload, [0x30, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77]);
    }

    #[test]
    fn test_decode_page2() {
        let raw = [0x00, 0x00, 0x00, 0x31, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x09];
        let frame = decode_radar(&raw).unwrap();
        assert_eq!(frame.page, PageId::Page2);
        assert_eq!(frame.payload[0], 0x31);
        assert_eq!(frame.payload[7], 0x09);
    }

    #[test]
    fn test_minimal_frame_is_zero_filled() {
        let frame = decode_radar(&[0xAA, 0xBB, 0xCC, 0x31]).unwrap();
        assert_eq!(frame.payload, PageId::Page2.default_payload());
    }

    #[test]
    fn test_long_frame_is_truncated() {
        let mut raw = [0xEEu8; 16];
        raw[3] = 0x30;
        let frame = decode_radar(&raw).unwrap();
        assert_eq!(frame.payload, [0x30, 0xEE, 0xEE, 0xEE, 0xEE, 0xEE, 0xEE, 0xEE]);
    }

    #[test]
    fn test_short_frame_rejected() {
        assert_eq!(decode_radar(&[]), Err(DecodeError::TooShort(0)));
        assert_eq!(decode_radar(&[0x30, 0x30, 0x30]), Err(DecodeError::TooShort(3)));
    }

    #[test]
    fn test_unknown_tag_rejected() {
        let raw = [0x30, 0x31, 0x30, 0x32, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
        assert_eq!(decode_radar(&raw), Err(DecodeError::UnknownPage(0x32)));
    }

    #[test]
    fn test_default_payloads() {
        assert_eq!(PageId::Page1.default_payload(), [0x30, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(PageId::Page2.default_payload(), [0x31, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_decode_battery() {
        assert_eq!(decode_battery(&[87]), Ok(87));
        assert_eq!(decode_battery(&[0]), Ok(0));
    }

    #[test]
    fn test_battery_out_of_range_passes_through() {
        assert_eq!(decode_battery(&[200]), Ok(200));
    }

    #[test]
    fn test_battery_wrong_length_rejected() {
        assert_eq!(decode_battery(&[]), Err(DecodeError::BatteryLength(0)));
        assert_eq!(decode_battery(&[50, 0]), Err(DecodeError::BatteryLength(2)));
    }
}
