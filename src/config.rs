//! Compile-time configuration for the radar proxy
//!
//! Identifiers the sensor and downstream clients depend on, timing
//! constants and board pins. Everything is tunable in one place.

/// A GATT UUID, either a 16-bit SIG assigned number or a full 128-bit value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BleUuid {
    Short(u16),
    Long(u128),
}

impl BleUuid {
    /// Bluetooth Base UUID, 0000xxxx-0000-1000-8000-00805F9B34FB
    const BASE: u128 = 0x0000_0000_0000_1000_8000_0080_5f9b_34fb;

    /// Full 128-bit value, expanding short UUIDs onto the base UUID
    pub const fn as_u128(self) -> u128 {
        match self {
            BleUuid::Short(short) => Self::BASE | ((short as u128) << 96),
            BleUuid::Long(long) => long,
        }
    }
}

/// Log level installed by the on-target logger
pub const LOG_LEVEL: log::LevelFilter = log::LevelFilter::Info;

/// The upstream radar sensor
pub mod source {
    use super::BleUuid;

    /// Advertised name of the sensor model family
    pub const TARGET_NAME: &str = "34660-5";

    /// Device information service and its identity characteristics
    pub const DEVICE_INFO_SERVICE: BleUuid = BleUuid::Short(0x180A);
    pub const MANUFACTURER_CHARACTERISTIC: BleUuid = BleUuid::Short(0x2A29);
    pub const MODEL_CHARACTERISTIC: BleUuid = BleUuid::Short(0x2A24);

    /// Vendor radar feed
    pub const RADARLIGHT_SERVICE: BleUuid =
        BleUuid::Long(0x8ce5cc01_0a4d_11e9_ab14_d663bd873d93);
    pub const RADARLIGHT_CHARACTERISTIC: BleUuid =
        BleUuid::Long(0x8ce5cc02_0a4d_11e9_ab14_d663bd873d93);

    /// Standard battery service
    pub const BATTERY_SERVICE: BleUuid = BleUuid::Short(0x180F);
    pub const BATTERY_LEVEL_CHARACTERISTIC: BleUuid = BleUuid::Short(0x2A19);

    /// Written once after subscribing to start the radar stream
    pub const RADAR_ACTIVATION_BYTES: [u8; 3] = [0x57, 0x09, 0x01];

    /// Identity the sensor must report (exact, case-sensitive)
    pub const EXPECTED_MANUFACTURER: &str = "Qingdao Magene Intelligence Technology Co., Ltd";
    /// Compared after trimming surrounding whitespace
    pub const EXPECTED_MODEL: &str = "320";

    /// Largest identity string we read back
    pub const MAX_IDENTITY_LEN: usize = 64;
}

/// Radar frame layout
pub mod radar {
    /// Offset of the page tag in a raw notification
    pub const TAG_OFFSET: usize = 3;

    /// Page tags
    pub const PAGE1_TAG: u8 = 0x30;
    pub const PAGE2_TAG: u8 = 0x31;

    /// Tag byte plus 7 data bytes
    pub const PAGE_SIZE: usize = 8;

    /// Page 1 followed by page 2
    pub const MERGED_SIZE: usize = PAGE_SIZE * 2;

    /// Largest notification payload we buffer
    pub const MAX_NOTIFICATION_SIZE: usize = 32;
}

/// Timing constants (milliseconds)
pub mod timing {
    /// Upper bound on a single scan
    pub const SCAN_TIMEOUT_MS: u32 = 10_000;

    /// Pause between failed discovery/connection attempts and after a disconnect
    pub const RETRY_DELAY_MS: u32 = 5_000;

    /// A radar page reverts to its default when not refreshed for this long
    pub const RADAR_PAGE_TIMEOUT_MS: u32 = 2_000;

    /// Bounded wait per characteristic per relay iteration
    pub const NOTIFY_POLL_MS: u32 = 50;

    /// Settle time between connecting and GATT discovery
    pub const DISCOVERY_SETTLE_MS: u32 = 2_000;

    /// Pause before re-advertising after an advertising failure
    pub const ADVERTISE_RETRY_MS: u32 = 1_000;
}

/// The bridge's own peripheral identity
pub mod peripheral {
    use super::BleUuid;

    /// Advertised local name
    pub const NAME: &str = "RadarProxy";

    /// Advertising interval
    pub const ADV_INTERVAL_MS: u32 = 250;

    /// Downstream radar service, mirroring the sensor family's own UUIDs
    pub const RADAR_SERVICE: BleUuid = BleUuid::Long(0xf3641400_00b0_4240_ba50_05ca45bf8abc);
    pub const RADAR_CHARACTERISTIC: BleUuid =
        BleUuid::Long(0xf3641401_00b0_4240_ba50_05ca45bf8abc);

    /// Battery value published at boot, before the sensor has reported
    pub const INITIAL_BATTERY: [u8; 1] = [0];
}

/// BLE host resources
pub mod ble {
    /// Source link plus one downstream client
    pub const CONNECTIONS_MAX: usize = 2;
    pub const L2CAP_CHANNELS_MAX: usize = 4;

    /// Services cached by the GATT client
    pub const MAX_SERVICES: usize = 10;
}

/// Status LED
pub mod led {
    /// How long the LED stays lit per blink
    pub const ON_MS: u64 = 200;
}
