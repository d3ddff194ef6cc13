//! Device configuration.
//!
//! [`DeviceConfig`] is the record persisted to NVS and mirrored in RAM by
//! [`ConfigStore`](crate::app::store::ConfigStore). It holds network
//! credentials, per-channel motor calibration and the daily feed schedule.
//! Runtime tunables that never leave RAM live in [`TaskConfig`].

use heapless::Vec;
use serde::{Deserialize, Serialize};

/// Number of stepper channels on the board.
pub const CHANNEL_COUNT: usize = 5;

/// Maximum feed times per day.
pub const MAX_SCHEDULE_ENTRIES: usize = 12;

pub const SERVER_MAX: usize = 64;
pub const PORT_MAX: usize = 2;
pub const ACCOUNT_ID_MAX: usize = 32;
pub const ACCOUNT_PASS_MAX: usize = 32;
pub const SSID_MAX: usize = 32;
pub const WIFI_PASS_MAX: usize = 32;

/// Step clock rate the channel periods are expressed in (1 tick = 1 µs).
pub const STEP_CLOCK_HZ: u32 = 1_000_000;

/// Factory motor calibration.
pub const DEFAULT_DIRECTION: Direction = Direction::Right;
pub const DEFAULT_FREQUENCY_HZ: u16 = 500;
pub const DEFAULT_STEPS_PER_UNIT: u16 = 200;

/// Version of the running firmware, compared against OTA candidates.
pub const FIRMWARE_VERSION: u16 = 3;

// --- Motor calibration ---

/// Rotation direction of a feeder auger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Direction {
    Left,
    #[default]
    Right,
}

impl Direction {
    /// `'L'` selects left; every other byte selects right.
    pub fn from_wire(b: u8) -> Self {
        if b == b'L' { Self::Left } else { Self::Right }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotorCalibration {
    pub direction: Direction,
    /// Step rate in Hz. Must be non-zero.
    pub frequency_hz: u16,
    /// Full steps per feed unit.
    pub steps_per_unit: u16,
}

impl Default for MotorCalibration {
    fn default() -> Self {
        Self {
            direction: DEFAULT_DIRECTION,
            frequency_hz: DEFAULT_FREQUENCY_HZ,
            steps_per_unit: DEFAULT_STEPS_PER_UNIT,
        }
    }
}

impl MotorCalibration {
    /// Step-clock ticks between output toggles: `STEP_CLOCK_HZ / (2 f)`.
    /// A zero frequency falls back to the factory rate.
    pub fn period_ticks(&self) -> u32 {
        let freq = if self.frequency_hz == 0 {
            DEFAULT_FREQUENCY_HZ
        } else {
            self.frequency_hz
        };
        STEP_CLOCK_HZ / (u32::from(freq) * 2)
    }

    /// Output toggles needed for `feed_count` units (two per step).
    pub fn toggles_for(&self, feed_count: u8) -> u32 {
        u32::from(feed_count).saturating_mul(u32::from(self.steps_per_unit) << 1)
    }
}

// --- Schedule ---

/// One feed time with a per-channel unit count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub hour: u8,
    pub minute: u8,
    pub feed_counts: [u8; CHANNEL_COUNT],
}

/// Wire size of one entry: hour, minute and one count per channel.
pub const SCHEDULE_ENTRY_LEN: usize = 2 + CHANNEL_COUNT;

// --- Network ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OperatingMode {
    /// Provisioning access point; the factory state.
    #[default]
    AccessPoint,
    /// Joined to the configured network and cloud account.
    Station,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub server: Vec<u8, SERVER_MAX>,
    pub port: u16,
    pub account_id: Vec<u8, ACCOUNT_ID_MAX>,
    pub account_pass: Vec<u8, ACCOUNT_PASS_MAX>,
    pub ssid: Vec<u8, SSID_MAX>,
    pub wifi_pass: Vec<u8, WIFI_PASS_MAX>,
    pub mode: OperatingMode,
    pub wifi_configured: bool,
    pub cloud_configured: bool,
}

impl NetworkConfig {
    /// Switch to station mode once both credential sets are present.
    /// Returns `true` when the device should restart into station mode.
    pub fn promote_if_ready(&mut self) -> bool {
        if self.wifi_configured && self.cloud_configured {
            self.mode = OperatingMode::Station;
            true
        } else {
            false
        }
    }
}

/// The persisted device record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub network: NetworkConfig,
    pub motors: [MotorCalibration; CHANNEL_COUNT],
    pub schedule: Vec<ScheduleEntry, MAX_SCHEDULE_ENTRIES>,
}

impl Default for DeviceConfig {
    /// Factory state: no credentials, default calibration, empty schedule.
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            motors: [MotorCalibration::default(); CHANNEL_COUNT],
            schedule: Vec::new(),
        }
    }
}

// --- Firmware metadata ---

/// Persisted record of the last image that passed OTA verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FirmwareInfo {
    pub installed_version: u16,
    pub installed_length: u32,
    pub installed_crc: u16,
}

// --- Runtime tunables ---

/// Task timing and protocol options. Not persisted.
#[derive(Debug, Clone, Copy)]
pub struct TaskConfig {
    /// Feed service loop period (milliseconds).
    pub control_loop_interval_ms: u32,
    /// How long the client task waits for a frame before looping (milliseconds).
    pub request_timeout_ms: u32,
    /// Acknowledge success with the request's own command code instead of OK.
    pub echo_command_status: bool,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            control_loop_interval_ms: 10,
            request_timeout_ms: 1000,
            echo_command_status: false,
        }
    }
}
