//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ CommandEngine / FeedService (domain)
//! ```
//!
//! Driven adapters (NVS, flash image region, RTC, GPIO, step timer, queues)
//! implement these traits. The domain core consumes them via generics or
//! trait objects, so it never touches hardware directly.
//!
//! ## Notes
//!
//! - **ConfigPort** implementations MUST validate before persisting.
//! - **MotorPort** and **StepTimerPort** are called from the step interrupt;
//!   implementations must not block or allocate.
//! - All port errors are typed; callers must handle every variant explicitly.

use core::time::Duration;

use crate::app::clock::DateTime;
use crate::config::{DeviceConfig, Direction, FirmwareInfo};
use crate::rpc::message::{DisplayNotice, FeedbackMessage};

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists the device configuration record.
///
/// Implementations MUST validate before persisting. Invalid values are
/// rejected with [`ConfigError::ValidationFailed`], not clamped, so a
/// malformed `SetSchedule` or `SetMotor` can never reach flash.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns [`DeviceConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<DeviceConfig, ConfigError>;

    /// Validate and persist the full record.
    fn save(&self, config: &DeviceConfig) -> Result<(), ConfigError>;
}

/// Persisted metadata of the last verified firmware image.
pub trait FirmwareInfoPort {
    /// Returns the zeroed record if none was ever written.
    fn load_info(&self) -> Result<FirmwareInfo, StorageError>;

    fn store_info(&self, info: &FirmwareInfo) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Image region port (driven adapter: domain ↔ OTA flash partition)
// ───────────────────────────────────────────────────────────────

/// The flash region a new firmware image is staged into.
pub trait ImageRegionPort {
    /// Region size in bytes.
    fn capacity(&self) -> u32;

    /// Erase the whole region.
    fn erase(&mut self) -> Result<(), StorageError>;

    /// Write `data` at `offset`. Fails if it would run past the region end.
    fn write(&mut self, offset: u32, data: &[u8]) -> Result<(), StorageError>;

    /// Fill `buf` from `offset`.
    fn read(&self, offset: u32, buf: &mut [u8]) -> Result<(), StorageError>;

    /// Mark the staged image as the next boot image.
    ///
    /// Targets whose bootloader copies the image on its own need nothing here.
    fn activate(&mut self) -> Result<(), StorageError> {
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Clock, camera and system ports
// ───────────────────────────────────────────────────────────────

/// Battery-backed real-time clock.
pub trait RtcPort {
    fn now(&self) -> DateTime;

    fn set(&mut self, time: &DateTime) -> Result<(), TimeError>;
}

/// Fire-and-forget capture request to the camera task.
pub trait CameraPort {
    fn trigger(&self);
}

/// Why the firmware is about to reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartReason {
    /// Both credential sets are present; reboot into station mode.
    NetworkConfigured,
    /// A verified image is ready to boot.
    FirmwareUpdated,
    FactoryReset,
}

/// A deliberate reset, carried out by the client task after `delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartRequest {
    pub delay: Duration,
    pub reason: RestartReason,
}

/// Chip-level control.
pub trait SystemPort {
    /// Wait `request.delay`, then reset. Does not return on hardware.
    fn restart(&mut self, request: RestartRequest);
}

// ───────────────────────────────────────────────────────────────
// Outbound queues (driven adapter: domain → transport / display)
// ───────────────────────────────────────────────────────────────

/// Non-blocking post of a feedback frame to the transport.
pub trait FeedbackSink {
    /// Returns `false` if the queue was full and the frame was dropped.
    fn post(&self, feedback: FeedbackMessage) -> bool;
}

/// Non-blocking post of a status-line notice to the display task.
pub trait DisplaySink {
    fn notify(&self, notice: DisplayNotice) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Motor ports (driven adapter: domain → GPIO / hardware timer)
// ───────────────────────────────────────────────────────────────

/// Step, direction and enable lines of the stepper bank.
///
/// Channel and line numbers are 0-based.
pub trait MotorPort {
    /// Drive direction line `line` (see [`crate::motor::direction_line`]).
    fn set_direction(&mut self, line: usize, direction: Direction);

    /// Energise or release the driver of `channel`.
    fn set_enable(&mut self, channel: usize, on: bool);

    /// Force the step output of `channel` low.
    fn step_low(&mut self, channel: usize);

    /// Invert the step output of `channel`.
    fn step_toggle(&mut self, channel: usize);
}

/// The shared step clock that paces [`MotorGroup::on_step_tick`](crate::motor::MotorGroup::on_step_tick).
pub trait StepTimerPort {
    /// Reprogram the tick period in step-clock ticks. `0` stops the clock.
    fn set_period(&mut self, period: u32);
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed integrity / deserialization check.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Underlying storage is full.
    StorageFull,
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from [`FirmwareInfoPort`] and [`ImageRegionPort`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Storage partition is full.
    Full,
    /// Access outside the region bounds.
    OutOfBounds,
    /// Generic I/O error.
    IoError,
}

/// Errors from [`RtcPort::set`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeError {
    /// The RTC peripheral rejected the write.
    SetFailed,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::StorageFull => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::OutOfBounds => write!(f, "access out of bounds"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for TimeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::SetFailed => write!(f, "RTC set failed"),
        }
    }
}
