//! Staging region for in-band firmware images.
//!
//! - **`target_os = "espidf"`**: the next OTA app partition, accessed with
//!   the raw `esp_partition_*` API because packets land at arbitrary
//!   offsets and the verifier reads the image back. Activation points the
//!   bootloader at it with `esp_ota_set_boot_partition`.
//! - **`not(target_os = "espidf")`**: a `Vec<u8>` filled with `0xFF` on
//!   erase, like NOR flash.

use crate::app::ports::{ImageRegionPort, StorageError};
use log::info;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::warn;

/// Mark the running image valid so the bootloader does not roll back.
///
/// Called once at boot, after the first successful start of a new image.
#[cfg(target_os = "espidf")]
pub fn confirm_running_image() {
    match esp_ota::mark_app_valid() {
        Ok(()) => info!("OTA: running image marked valid"),
        Err(e) => warn!("OTA: mark_app_valid failed: {:?}", e),
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn confirm_running_image() {
    info!("OTA rollback check (simulation): skipped");
}

// ── Flash partition ──────────────────────────────────────────

#[cfg(target_os = "espidf")]
pub struct FlashImageRegion {
    partition: *const esp_partition_t,
    size: u32,
}

// SAFETY: the partition table entry is immutable for the program's life
// and the esp_partition_* calls are thread-safe.
#[cfg(target_os = "espidf")]
unsafe impl Send for FlashImageRegion {}

#[cfg(target_os = "espidf")]
impl FlashImageRegion {
    /// Bind to the OTA slot the running app is *not* executing from.
    pub fn next_update_slot() -> Result<Self, StorageError> {
        // SAFETY: a null start means "after the running partition".
        let partition = unsafe { esp_ota_get_next_update_partition(core::ptr::null()) };
        if partition.is_null() {
            warn!("OTA: no update partition in the partition table");
            return Err(StorageError::NotFound);
        }
        // SAFETY: non-null entries from the partition table are 'static.
        let size = unsafe { (*partition).size };
        info!("OTA: staging region {} bytes", size);
        Ok(Self { partition, size })
    }

    fn check(&self, offset: u32, len: usize) -> Result<(), StorageError> {
        match offset.checked_add(len as u32) {
            Some(end) if end <= self.size => Ok(()),
            _ => Err(StorageError::OutOfBounds),
        }
    }
}

#[cfg(target_os = "espidf")]
impl ImageRegionPort for FlashImageRegion {
    fn capacity(&self) -> u32 {
        self.size
    }

    fn erase(&mut self) -> Result<(), StorageError> {
        // SAFETY: whole-partition range, sector aligned by construction.
        let ret = unsafe { esp_partition_erase_range(self.partition, 0, self.size as usize) };
        if ret != ESP_OK as i32 {
            warn!("OTA: erase failed (rc={})", ret);
            return Err(StorageError::IoError);
        }
        Ok(())
    }

    fn write(&mut self, offset: u32, data: &[u8]) -> Result<(), StorageError> {
        self.check(offset, data.len())?;
        // SAFETY: bounds checked above; `data` is valid for its length.
        let ret = unsafe {
            esp_partition_write(self.partition, offset as usize, data.as_ptr() as *const _, data.len())
        };
        if ret != ESP_OK as i32 {
            return Err(StorageError::IoError);
        }
        Ok(())
    }

    fn read(&self, offset: u32, buf: &mut [u8]) -> Result<(), StorageError> {
        self.check(offset, buf.len())?;
        // SAFETY: bounds checked above; `buf` is valid for its length.
        let ret = unsafe {
            esp_partition_read(self.partition, offset as usize, buf.as_mut_ptr() as *mut _, buf.len())
        };
        if ret != ESP_OK as i32 {
            return Err(StorageError::IoError);
        }
        Ok(())
    }

    fn activate(&mut self) -> Result<(), StorageError> {
        // SAFETY: `partition` is a valid app partition entry.
        let ret = unsafe { esp_ota_set_boot_partition(self.partition) };
        if ret != ESP_OK as i32 {
            warn!("OTA: set boot partition failed (rc={})", ret);
            return Err(StorageError::IoError);
        }
        info!("OTA: boot partition switched");
        Ok(())
    }
}

// ── In-memory region ─────────────────────────────────────────

/// Host-side staging region.
pub struct MemoryImageRegion {
    data: Vec<u8>,
    activated: bool,
}

impl MemoryImageRegion {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0xFF; capacity],
            activated: false,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn is_activated(&self) -> bool {
        self.activated
    }

    fn range(&self, offset: u32, len: usize) -> Result<core::ops::Range<usize>, StorageError> {
        let start = offset as usize;
        match start.checked_add(len) {
            Some(end) if end <= self.data.len() => Ok(start..end),
            _ => Err(StorageError::OutOfBounds),
        }
    }
}

impl ImageRegionPort for MemoryImageRegion {
    fn capacity(&self) -> u32 {
        self.data.len() as u32
    }

    fn erase(&mut self) -> Result<(), StorageError> {
        self.data.fill(0xFF);
        self.activated = false;
        Ok(())
    }

    fn write(&mut self, offset: u32, data: &[u8]) -> Result<(), StorageError> {
        let r = self.range(offset, data.len())?;
        self.data[r].copy_from_slice(data);
        Ok(())
    }

    fn read(&self, offset: u32, buf: &mut [u8]) -> Result<(), StorageError> {
        let r = self.range(offset, buf.len())?;
        buf.copy_from_slice(&self.data[r]);
        Ok(())
    }

    fn activate(&mut self) -> Result<(), StorageError> {
        self.activated = true;
        info!("OTA(sim): staged image activated");
        Ok(())
    }
}
