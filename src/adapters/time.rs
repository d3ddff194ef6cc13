//! Wall-clock adapter.
//!
//! Implements [`RtcPort`] on top of the system clock. The clock is global
//! to the process, so every [`SystemClock`] handle sees the same time: the
//! client task sets it, the feed service reads it.
//!
//! - **`target_os = "espidf"`**: `settimeofday` / `gettimeofday`, with the
//!   calendar split done by `chrono` in [`DateTime`]; the RTC keeps counting
//!   across soft restarts.
//! - **`not(target_os = "espidf")`**: host `SystemTime` shifted by a
//!   process-wide offset that `set` adjusts.

use crate::app::clock::DateTime;
use crate::app::ports::{RtcPort, TimeError};

#[cfg(not(target_os = "espidf"))]
use core::sync::atomic::{AtomicI64, Ordering};

#[cfg(target_os = "espidf")]
use log::warn;

/// Seconds added to host time by `set` (simulation only).
#[cfg(not(target_os = "espidf"))]
static SIM_OFFSET_SECS: AtomicI64 = AtomicI64::new(0);

/// Handle to the system wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }

    #[cfg(target_os = "espidf")]
    fn unix_now() -> i64 {
        let mut tv = esp_idf_svc::sys::timeval { tv_sec: 0, tv_usec: 0 };
        // SAFETY: `tv` is a valid out-pointer; a null timezone is allowed.
        if unsafe { esp_idf_svc::sys::gettimeofday(&mut tv, core::ptr::null_mut()) } != 0 {
            return 0;
        }
        tv.tv_sec as i64
    }

    #[cfg(not(target_os = "espidf"))]
    fn unix_now() -> i64 {
        let host = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |d| d.as_secs() as i64);
        host + SIM_OFFSET_SECS.load(Ordering::Relaxed)
    }
}

impl RtcPort for SystemClock {
    fn now(&self) -> DateTime {
        DateTime::from_unix(Self::unix_now())
    }

    #[cfg(target_os = "espidf")]
    fn set(&mut self, time: &DateTime) -> Result<(), TimeError> {
        let tv = esp_idf_svc::sys::timeval {
            tv_sec: time.to_unix() as _,
            tv_usec: 0,
        };
        // SAFETY: `tv` is fully initialised; a null timezone is allowed.
        let rc = unsafe { esp_idf_svc::sys::settimeofday(&tv, core::ptr::null()) };
        if rc != 0 {
            warn!("clock: settimeofday failed (rc={})", rc);
            return Err(TimeError::SetFailed);
        }
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn set(&mut self, time: &DateTime) -> Result<(), TimeError> {
        let current = Self::unix_now() - SIM_OFFSET_SECS.load(Ordering::Relaxed);
        SIM_OFFSET_SECS.store(time.to_unix() - current, Ordering::Relaxed);
        log::info!("clock(sim): set to {}", time);
        Ok(())
    }
}
