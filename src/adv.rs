//! Advertising data parsing
//!
//! Walks the length-type-value AD structures of a raw advertising or scan
//! response payload. Used by the scan handler to filter by local name.

/// Shortened Local Name
pub const AD_TYPE_SHORTENED_LOCAL_NAME: u8 = 0x08;
/// Complete Local Name
pub const AD_TYPE_COMPLETE_LOCAL_NAME: u8 = 0x09;

/// One AD structure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdStructure<'a> {
    pub ad_type: u8,
    pub data: &'a [u8],
}

/// Iterator over the AD structures in a payload
///
/// Stops at a zero length byte or a structure running past the end.
pub struct AdStructures<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> AdStructures<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }
}

impl<'a> Iterator for AdStructures<'a> {
    type Item = AdStructure<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let len = usize::from(*self.data.get(self.pos)?);
        if len == 0 {
            return None;
        }

        let end = self.pos + 1 + len;
        let body = self.data.get(self.pos + 1..end)?;
        self.pos = end;

        Some(AdStructure {
            ad_type: body[0],
            data: &body[1..],
        })
    }
}

/// First complete or shortened local name in the payload
///
/// Names that are not valid UTF-8 are skipped.
pub fn local_name(data: &[u8]) -> Option<&str> {
    AdStructures::new(data)
        .filter(|ad| {
            ad.ad_type == AD_TYPE_COMPLETE_LOCAL_NAME || ad.ad_type == AD_TYPE_SHORTENED_LOCAL_NAME
        })
        .find_map(|ad| core::str::from_utf8(ad.data).ok())
}

/// Whether the payload advertises exactly `name`
pub fn matches_name(data: &[u8], name: &str) -> bool {
    local_name(data) == Some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_local_name() {
        let data = [
            0x02, 0x01, 0x06, // flags
            0x08, 0x09, b'3', b'4', b'6', b'6', b'0', b'-', b'5',
        ];
        assert_eq!(local_name(&data), Some("34660-5"));
        assert!(matches_name(&data, "34660-5"));
    }

    #[test]
    fn test_shortened_local_name() {
        let data = [0x04, 0x08, b'R', b'a', b'd'];
        assert_eq!(local_name(&data), Some("Rad"));
    }

    #[test]
    fn test_name_must_match_exactly() {
        let data = [0x08, 0x09, b'3', b'4', b'6', b'6', b'0', b'-', b'6'];
        assert!(!matches_name(&data, "34660-5"));

        let prefix = [0x04, 0x09, b'3', b'4', b'6'];
        assert!(!matches_name(&prefix, "34660-5"));
    }

    #[test]
    fn test_no_name() {
        assert_eq!(local_name(&[0x02, 0x01, 0x06]), None);
        assert_eq!(local_name(&[]), None);
    }

    #[test]
    fn test_truncated_structure_stops_parsing() {
        // Claims 9 bytes, only 3 present
        let data = [0x02, 0x01, 0x06, 0x09, 0x09, b'a', b'b'];
        assert_eq!(local_name(&data), None);
        assert_eq!(AdStructures::new(&data).count(), 1);
    }

    #[test]
    fn test_zero_length_terminates() {
        let data = [0x00, 0x04, 0x09, b'a', b'b', b'c'];
        assert_eq!(local_name(&data), None);
    }

    #[test]
    fn test_invalid_utf8_name_skipped() {
        let data = [0x03, 0x09, 0xff, 0xfe, 0x03, 0x08, b'o', b'k'];
        assert_eq!(local_name(&data), Some("ok"));
    }
}
