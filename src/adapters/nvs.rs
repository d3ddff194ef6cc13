//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`ConfigPort`] and [`FirmwareInfoPort`] for the feeder on the
//! raw `nvs_*` API. Records are `postcard`-encoded blobs in one namespace.
//!
//! - Config validation: the record is range-checked before persistence.
//! - Atomic writes: ESP-IDF NVS commits are atomic per `nvs_commit()`, so a
//!   power cut leaves either the old or the new record.
//! - The simulation backend keeps blobs in a `HashMap` (dev/test only).

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::app::ports::{ConfigError, ConfigPort, FirmwareInfoPort, StorageError};
use crate::config::{DeviceConfig, FirmwareInfo};
use log::info;

#[cfg(target_os = "espidf")]
use log::warn;

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

const NAMESPACE: &str = "feeder";
const CONFIG_KEY: &str = "devcfg";
const FIRMWARE_KEY: &str = "fwinfo";

/// Largest blob this adapter will read back.
const MAX_BLOB_SIZE: usize = 1024;

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: std::cell::RefCell<HashMap<String, Vec<u8>>>,
}

impl NvsAdapter {
    /// Create a new NvsAdapter and initialise NVS flash.
    ///
    /// On first boot or after a version mismatch the NVS partition is erased
    /// and re-initialised automatically.
    pub fn new() -> Result<Self, StorageError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: nvs_flash_init / nvs_flash_erase are called from the
            // single main-task context before any concurrent NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES as i32
                || ret == ESP_ERR_NVS_NEW_VERSION_FOUND as i32
            {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK as i32 {
                    return Err(StorageError::IoError);
                }
                if unsafe { nvs_flash_init() } != ESP_OK as i32 {
                    return Err(StorageError::IoError);
                }
            } else if ret != ESP_OK as i32 {
                return Err(StorageError::IoError);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn composite_key(namespace: &str, key: &str) -> String {
        format!("{}::{}", namespace, key)
    }

    /// NVS names are at most 15 bytes plus the terminator.
    #[cfg(target_os = "espidf")]
    fn c_name(name: &str) -> [u8; 16] {
        let mut buf = [0u8; 16];
        let bytes = name.as_bytes();
        let len = bytes.len().min(15);
        buf[..len].copy_from_slice(&bytes[..len]);
        buf
    }

    /// Open an NVS namespace, execute a closure with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(namespace: &str, write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let ns = Self::c_name(namespace);
        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        // SAFETY: `ns` is null-terminated and outlives the call.
        let ret = unsafe { nvs_open(ns.as_ptr() as *const _, mode, &mut handle) };
        if ret != ESP_OK as i32 {
            return Err(ret);
        }

        let result = f(handle);
        // SAFETY: `handle` was opened above and is closed exactly once.
        unsafe {
            nvs_close(handle);
        }
        result
    }

    // ── Blob primitives ──────────────────────────────────────

    #[cfg(not(target_os = "espidf"))]
    fn get_blob(&self, namespace: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        self.store
            .borrow()
            .get(&Self::composite_key(namespace, key))
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    #[cfg(target_os = "espidf")]
    fn get_blob(&self, namespace: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let name = Self::c_name(key);
        let result = Self::with_nvs_handle(namespace, false, |handle| {
            let mut size: usize = 0;
            // SAFETY: a null buffer asks NVS for the stored length only.
            let ret = unsafe {
                nvs_get_blob(handle, name.as_ptr() as *const _, core::ptr::null_mut(), &mut size)
            };
            if ret != ESP_OK as i32 {
                return Err(ret);
            }
            if size == 0 || size > MAX_BLOB_SIZE {
                return Err(ESP_ERR_NVS_INVALID_LENGTH as i32);
            }

            let mut buf = vec![0u8; size];
            // SAFETY: `buf` holds exactly `size` bytes.
            let ret = unsafe {
                nvs_get_blob(handle, name.as_ptr() as *const _, buf.as_mut_ptr() as *mut _, &mut size)
            };
            if ret != ESP_OK as i32 {
                return Err(ret);
            }
            Ok(buf)
        });
        match result {
            Ok(bytes) => Ok(bytes),
            Err(e) if e == ESP_ERR_NVS_NOT_FOUND as i32 => Err(StorageError::NotFound),
            Err(e) => {
                warn!("NvsAdapter: read {}::{} failed ({})", namespace, key, e);
                Err(StorageError::IoError)
            }
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn put_blob(&self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        if data.len() > MAX_BLOB_SIZE {
            return Err(StorageError::Full);
        }
        self.store
            .borrow_mut()
            .insert(Self::composite_key(namespace, key), data.to_vec());
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn put_blob(&self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        if data.len() > MAX_BLOB_SIZE {
            return Err(StorageError::Full);
        }
        let name = Self::c_name(key);
        let result = Self::with_nvs_handle(namespace, true, |handle| {
            // SAFETY: `data` is valid for `data.len()` bytes.
            let ret = unsafe {
                nvs_set_blob(handle, name.as_ptr() as *const _, data.as_ptr() as *const _, data.len())
            };
            if ret != ESP_OK as i32 {
                return Err(ret);
            }
            let ret = unsafe { nvs_commit(handle) };
            if ret != ESP_OK as i32 {
                return Err(ret);
            }
            Ok(())
        });
        result.map_err(|e| {
            warn!("NvsAdapter: write {}::{} failed ({})", namespace, key, e);
            if e == ESP_ERR_NVS_NOT_ENOUGH_SPACE as i32 {
                StorageError::Full
            } else {
                StorageError::IoError
            }
        })
    }

    // ── Typed records ────────────────────────────────────────

    fn load_record<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        match self.get_blob(NAMESPACE, key) {
            Ok(bytes) => postcard::from_bytes(&bytes)
                .map(Some)
                .map_err(|_| StorageError::IoError),
            Err(StorageError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn store_record<T: Serialize>(&self, key: &str, value: &T) -> Result<usize, StorageError> {
        let bytes = postcard::to_allocvec(value).map_err(|_| StorageError::IoError)?;
        self.put_blob(NAMESPACE, key, &bytes)?;
        Ok(bytes.len())
    }
}

/// Range-check a record before it is allowed to reach flash.
pub fn validate_config(cfg: &DeviceConfig) -> Result<(), ConfigError> {
    for entry in &cfg.schedule {
        if entry.hour > 23 {
            return Err(ConfigError::ValidationFailed("schedule hour must be 0–23"));
        }
        if entry.minute > 59 {
            return Err(ConfigError::ValidationFailed("schedule minute must be 0–59"));
        }
    }
    if cfg.motors.iter().any(|m| m.frequency_hz == 0) {
        return Err(ConfigError::ValidationFailed("motor frequency must be non-zero"));
    }
    Ok(())
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<DeviceConfig, ConfigError> {
        match self.load_record::<DeviceConfig>(CONFIG_KEY) {
            Ok(Some(cfg)) => {
                info!("NvsAdapter: loaded config ({} schedule entries)", cfg.schedule.len());
                Ok(cfg)
            }
            Ok(None) => {
                info!("NvsAdapter: no stored config, using defaults");
                Ok(DeviceConfig::default())
            }
            Err(StorageError::IoError) => Err(ConfigError::Corrupted),
            Err(_) => Err(ConfigError::IoError),
        }
    }

    fn save(&self, config: &DeviceConfig) -> Result<(), ConfigError> {
        validate_config(config)?;
        match self.store_record(CONFIG_KEY, config) {
            Ok(len) => {
                info!("NvsAdapter: config saved ({} bytes)", len);
                Ok(())
            }
            Err(StorageError::Full) => Err(ConfigError::StorageFull),
            Err(_) => Err(ConfigError::IoError),
        }
    }
}

impl FirmwareInfoPort for NvsAdapter {
    fn load_info(&self) -> Result<FirmwareInfo, StorageError> {
        Ok(self.load_record(FIRMWARE_KEY)?.unwrap_or_default())
    }

    fn store_info(&self, info: &FirmwareInfo) -> Result<(), StorageError> {
        self.store_record(FIRMWARE_KEY, info)?;
        info!(
            "NvsAdapter: firmware info v{} ({} bytes, crc {:04X})",
            info.installed_version, info.installed_length, info.installed_crc
        );
        Ok(())
    }
}
