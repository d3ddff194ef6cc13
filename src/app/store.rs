//! In-memory mirror of the persisted [`DeviceConfig`].
//!
//! One writer (the command dispatcher) and one reader (the feed service)
//! share a [`ConfigStore`]. Mutations are applied to a copy, persisted
//! through the [`ConfigPort`], and only then published to the mirror, so a
//! failed write leaves RAM equal to the last persisted record.
//!
//! ```text
//!  CommandEngine ──commit──▶ ┌─────────────┐ ──save──▶ ConfigPort (NVS)
//!                            │ ConfigStore │
//!  FeedService   ◀──read──── └─────────────┘
//! ```

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use log::{info, warn};

use super::ports::{ConfigError, ConfigPort};
use crate::config::DeviceConfig;

pub struct ConfigStore {
    inner: Mutex<CriticalSectionRawMutex, RefCell<DeviceConfig>>,
}

impl ConfigStore {
    pub fn new(config: DeviceConfig) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(config)),
        }
    }

    /// Load the persisted record, falling back to factory defaults.
    pub fn load(port: &dyn ConfigPort) -> Self {
        let config = port.load().unwrap_or_else(|e| {
            warn!("ConfigStore: load failed ({}), using defaults", e);
            DeviceConfig::default()
        });
        Self::new(config)
    }

    /// Clone of the current record.
    pub fn snapshot(&self) -> DeviceConfig {
        self.inner.lock(|c| c.borrow().clone())
    }

    /// Run `f` against the current record. Keep `f` short: the lock is a
    /// critical section.
    pub fn read<R>(&self, f: impl FnOnce(&DeviceConfig) -> R) -> R {
        self.inner.lock(|c| f(&c.borrow()))
    }

    /// Mutate a copy of the record, persist it, then publish it.
    ///
    /// The lock is not held across the storage write. On a persist failure
    /// the mirror keeps the previous record and the error is returned.
    pub fn commit<R>(
        &self,
        port: &dyn ConfigPort,
        f: impl FnOnce(&mut DeviceConfig) -> R,
    ) -> Result<R, ConfigError> {
        let mut next = self.snapshot();
        let out = f(&mut next);
        if let Err(e) = port.save(&next) {
            warn!("ConfigStore: persist failed ({}), keeping previous record", e);
            return Err(e);
        }
        self.inner.lock(|c| *c.borrow_mut() = next);
        info!("ConfigStore: record committed");
        Ok(out)
    }
}
