//! Unified error types for the feeder firmware.
//!
//! Every subsystem error converts into a single [`Error`] so the command
//! dispatcher has one place where failures become wire status codes.
//! All variants are `Copy` so they can be passed through handler results
//! without allocation.

use core::fmt;

use crate::app::ports::{ConfigError, StorageError, TimeError};
use crate::rpc::codec::FrameError;
use crate::rpc::ota::OtaError;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the command path funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Inbound frame failed preamble, length or checksum validation.
    Frame(FrameError),
    /// A per-command length or field bound was violated.
    Validation(&'static str),
    /// Configuration could not be persisted.
    Config(ConfigError),
    /// Firmware metadata or image region storage failed.
    Storage(StorageError),
    /// RTC rejected the new wall-clock time.
    Time(TimeError),
    /// OTA transfer failed (wrong state, size or CRC mismatch).
    Ota(OtaError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Frame(e) => write!(f, "frame: {e}"),
            Self::Validation(msg) => write!(f, "validation: {msg}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Time(e) => write!(f, "time: {e}"),
            Self::Ota(e) => write!(f, "ota: {e}"),
        }
    }
}

impl From<FrameError> for Error {
    fn from(e: FrameError) -> Self {
        Self::Frame(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<TimeError> for Error {
    fn from(e: TimeError) -> Self {
        Self::Time(e)
    }
}

impl From<OtaError> for Error {
    fn from(e: OtaError) -> Self {
        Self::Ota(e)
    }
}

/// Convenience alias used by command handlers.
pub type Result<T> = core::result::Result<T, Error>;
