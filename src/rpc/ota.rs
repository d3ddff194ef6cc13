//! In-band firmware update over the command protocol.
//!
//! Flow: OtaUpdateRequest → N × OtaBinData → OtaVerify → restart
//!
//! ```text
//!            request(v > running)          bin(index 0)
//!  ┌──────┐ ─────────────────────▶ ┌───────────┐ ──────────▶ ┌──────────────┐
//!  │ Idle │                        │ Requested │             │ Transferring │◀─┐
//!  └──────┘ ◀──── verify (any) ─── └───────────┘             └──────────────┘  │
//!      ▲                                                        │   bin(i ≠ 0) │
//!      └───────────────────── verify (pass or fail) ────────────┘──────────────┘
//! ```
//!
//! Packet 0 carries an 8-byte header (version, CRC16, total size) ahead of
//! the first image slice. Later packets are appended at the running write
//! offset. Delivery order is the transport's responsibility: there is no
//! reordering and no duplicate detection. A failed verify leaves the
//! staged region partly written and the boot slot unchanged; recovery is a
//! fresh request, which erases it again.

use core::fmt;
use log::{info, warn};

use super::checksum::Crc16;
use super::reader::ByteReader;
use crate::app::ports::{FirmwareInfoPort, ImageRegionPort};
use crate::config::FirmwareInfo;

/// Length of the header at the front of packet 0.
pub const BIN_HEADER_LEN: usize = 8;

/// Read-back chunk used when computing the image CRC.
const VERIFY_CHUNK: usize = 256;

// ── Error type ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtaError {
    /// Request payload is not exactly a 2-byte version.
    InvalidRequest,
    /// Image data arrived with no accepted request.
    NotRequested,
    /// A continuation packet arrived before packet 0.
    NotTransferring,
    /// Packet 0 shorter than its 8-byte header.
    HeaderTooShort,
    /// Declared size or write offset exceeds the image region.
    ImageTooLarge,
    EraseFailed,
    WriteFailed,
    /// Firmware metadata could not be persisted.
    InfoWriteFailed,
    /// Written length or CRC16 does not match the declared image.
    VerificationFailed,
    /// Boot slot selection failed.
    ActivateFailed,
}

impl fmt::Display for OtaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRequest => write!(f, "request must carry a 2-byte version"),
            Self::NotRequested => write!(f, "no OTA request accepted"),
            Self::NotTransferring => write!(f, "continuation packet before packet 0"),
            Self::HeaderTooShort => write!(f, "packet 0 shorter than 8-byte header"),
            Self::ImageTooLarge => write!(f, "image exceeds staging region"),
            Self::EraseFailed => write!(f, "image region erase failed"),
            Self::WriteFailed => write!(f, "image region write failed"),
            Self::InfoWriteFailed => write!(f, "firmware info write failed"),
            Self::VerificationFailed => write!(f, "image size or CRC mismatch"),
            Self::ActivateFailed => write!(f, "boot slot activation failed"),
        }
    }
}

// ── State machine ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtaState {
    Idle,
    /// Request accepted and region erased; waiting for packet 0.
    Requested,
    /// Packet 0 received; appending image data.
    Transferring,
}

/// Transfer bookkeeping between a request and its verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OtaSession {
    pub fw_version: u16,
    pub fw_crc16: u16,
    pub fw_size: u32,
    pub write_offset: u32,
}

/// Result of a version request that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Session opened and region erased.
    Accepted,
    /// Candidate is not newer than the running firmware; nothing changed.
    AlreadyUpdated,
}

pub struct OtaEngine {
    state: OtaState,
    session: OtaSession,
    running_version: u16,
}

impl OtaEngine {
    pub fn new(running_version: u16) -> Self {
        Self {
            state: OtaState::Idle,
            session: OtaSession::default(),
            running_version,
        }
    }

    pub fn state(&self) -> OtaState {
        self.state
    }

    pub fn session(&self) -> &OtaSession {
        &self.session
    }

    fn reset(&mut self) {
        self.state = OtaState::Idle;
        self.session = OtaSession::default();
    }

    /// Handle `OtaUpdateRequest`.
    ///
    /// A newer version clears the firmware record, erases the image region
    /// and opens a session. Any storage failure leaves the engine Idle.
    pub fn request(
        &mut self,
        payload: &[u8],
        firmware: &dyn FirmwareInfoPort,
        image: &mut dyn ImageRegionPort,
    ) -> Result<RequestOutcome, OtaError> {
        if payload.len() != 2 {
            return Err(OtaError::InvalidRequest);
        }
        let candidate = u16::from_le_bytes([payload[0], payload[1]]);
        if candidate <= self.running_version {
            info!(
                "OTA: v{} requested, running v{}, already updated",
                candidate, self.running_version
            );
            return Ok(RequestOutcome::AlreadyUpdated);
        }

        self.reset();
        self.session.fw_version = candidate;

        if let Err(e) = firmware.store_info(&FirmwareInfo::default()) {
            warn!("OTA: clearing firmware info failed: {}", e);
            self.reset();
            return Err(OtaError::InfoWriteFailed);
        }
        if let Err(e) = image.erase() {
            warn!("OTA: region erase failed: {}", e);
            self.reset();
            return Err(OtaError::EraseFailed);
        }

        self.state = OtaState::Requested;
        info!("OTA: request v{} accepted, region erased", candidate);
        Ok(RequestOutcome::Accepted)
    }

    /// Handle one `OtaBinData` packet. Returns the new write offset.
    ///
    /// A rejected or failed packet leaves state and offset unchanged.
    pub fn write_packet(
        &mut self,
        index: u16,
        payload: &[u8],
        image: &mut dyn ImageRegionPort,
    ) -> Result<u32, OtaError> {
        if self.state == OtaState::Idle {
            return Err(OtaError::NotRequested);
        }

        if index == 0 {
            let mut r = ByteReader::new(payload);
            let (Ok(version), Ok(crc), Ok(size)) = (r.u16_le(), r.u16_le(), r.u32_le()) else {
                return Err(OtaError::HeaderTooShort);
            };
            let slice = &payload[BIN_HEADER_LEN..];
            if size > image.capacity() || slice.len() as u32 > image.capacity() {
                return Err(OtaError::ImageTooLarge);
            }
            image.write(0, slice).map_err(|e| {
                warn!("OTA: packet 0 write failed: {}", e);
                OtaError::WriteFailed
            })?;

            self.session = OtaSession {
                fw_version: version,
                fw_crc16: crc,
                fw_size: size,
                write_offset: slice.len() as u32,
            };
            self.state = OtaState::Transferring;
            info!(
                "OTA: packet 0: v{} size={} crc=0x{:04X}",
                version, size, crc
            );
            return Ok(self.session.write_offset);
        }

        if self.state != OtaState::Transferring {
            return Err(OtaError::NotTransferring);
        }
        let offset = self.session.write_offset;
        let end = offset
            .checked_add(payload.len() as u32)
            .filter(|&end| end <= image.capacity())
            .ok_or(OtaError::ImageTooLarge)?;
        image.write(offset, payload).map_err(|e| {
            warn!("OTA: packet {} write failed: {}", index, e);
            OtaError::WriteFailed
        })?;
        self.session.write_offset = end;
        Ok(end)
    }

    /// Handle `OtaVerify`.
    ///
    /// On success the region is activated and the new firmware record is
    /// persisted; the caller then restarts. Every outcome returns to Idle.
    pub fn verify(
        &mut self,
        firmware: &dyn FirmwareInfoPort,
        image: &mut dyn ImageRegionPort,
    ) -> Result<FirmwareInfo, OtaError> {
        let session = self.session;
        let state = self.state;
        self.reset();

        if state != OtaState::Transferring {
            return Err(OtaError::NotTransferring);
        }
        if session.write_offset != session.fw_size {
            warn!(
                "OTA: verify failed, wrote {} of {} bytes",
                session.write_offset, session.fw_size
            );
            return Err(OtaError::VerificationFailed);
        }

        let crc = image_crc(image, session.fw_size)?;
        if crc != session.fw_crc16 {
            warn!(
                "OTA: verify failed, crc 0x{:04X}, expected 0x{:04X}",
                crc, session.fw_crc16
            );
            return Err(OtaError::VerificationFailed);
        }

        // The boot slot only moves once the record describing it is durable.
        let info = FirmwareInfo {
            installed_version: session.fw_version,
            installed_length: session.fw_size,
            installed_crc: session.fw_crc16,
        };
        firmware.store_info(&info).map_err(|e| {
            warn!("OTA: firmware info write failed: {}", e);
            OtaError::InfoWriteFailed
        })?;

        if let Err(e) = image.activate() {
            warn!("OTA: activate failed: {}", e);
            if let Err(e) = firmware.store_info(&FirmwareInfo::default()) {
                warn!("OTA: firmware info rollback failed: {}", e);
            }
            return Err(OtaError::ActivateFailed);
        }

        info!("OTA: v{} verified ({} bytes)", info.installed_version, info.installed_length);
        Ok(info)
    }
}

/// CRC16 of region bytes `[0, len)`, read back in chunks.
fn image_crc(image: &dyn ImageRegionPort, len: u32) -> Result<u16, OtaError> {
    let mut crc = Crc16::new();
    let mut buf = [0u8; VERIFY_CHUNK];
    let mut offset = 0u32;
    while offset < len {
        let n = (len - offset).min(VERIFY_CHUNK as u32) as usize;
        image.read(offset, &mut buf[..n]).map_err(|e| {
            warn!("OTA: read-back failed at {}: {}", offset, e);
            OtaError::VerificationFailed
        })?;
        crc.update(&buf[..n]);
        offset += n as u32;
    }
    Ok(crc.finish())
}

// ── Tests ─────────────────────────────────────────────────────
