//! Preamble-synchronised frame codec.
//!
//! Wire format:
//! ```text
//! ┌──────────────┬─────────┬──────────┬──────────┬─────────────┬──────────┐
//! │ A5 A5 A5 A5  │ command │ index    │ length   │ payload     │ checksum │
//! │ preamble (4) │ u8      │ u16 LE   │ u16 LE   │ length B    │ u8       │
//! └──────────────┴─────────┴──────────┴──────────┴─────────────┴──────────┘
//! ```
//!
//! The transport hands over one buffer per frame. Leading noise is
//! tolerated: the decoder scans for four consecutive start codes and reads
//! the header immediately after the fourth. The checksum is the seeded
//! byte sum of `command..payload`.

use core::fmt;
use log::warn;

use super::checksum::checksum8;
use super::message::{HEADER_LEN, Message};
use super::reader::ByteReader;

/// Preamble byte.
pub const START_CODE: u8 = 0xA5;

/// Consecutive start codes required before a header.
pub const PREAMBLE_LEN: usize = 4;

/// Largest payload accepted from a client (protects against memory exhaustion).
pub const MAX_RX_PAYLOAD: usize = 1024;

/// Preamble, header and checksum around a payload.
pub const FRAME_OVERHEAD: usize = PREAMBLE_LEN + HEADER_LEN + 1;

// ── Error type ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// No run of start codes before the buffer ended.
    PreambleNotFound,
    /// Buffer ended inside the header, payload or checksum.
    Truncated,
    /// Trailing checksum does not match the frame contents.
    ChecksumMismatch,
    /// Declared payload length exceeds [`MAX_RX_PAYLOAD`].
    PayloadTooLarge,
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PreambleNotFound => write!(f, "preamble not found"),
            Self::Truncated => write!(f, "frame truncated"),
            Self::ChecksumMismatch => write!(f, "checksum mismatch"),
            Self::PayloadTooLarge => write!(f, "payload exceeds {} bytes", MAX_RX_PAYLOAD),
        }
    }
}

// ── Decode ────────────────────────────────────────────────────

/// Offset of the first header byte, just past the first full preamble run.
fn header_start(buf: &[u8]) -> Option<usize> {
    let mut run = 0;
    for (i, &b) in buf.iter().enumerate() {
        if b == START_CODE {
            run += 1;
            if run >= PREAMBLE_LEN {
                return Some(i + 1);
            }
        } else {
            run = 0;
        }
    }
    None
}

/// Parse one frame out of `buf`.
///
/// No I/O; the only side effect is the payload allocation handed to the
/// returned message. An empty payload is never allocated.
pub fn parse(buf: &[u8]) -> Result<Message, FrameError> {
    let start = header_start(buf).ok_or(FrameError::PreambleNotFound)?;
    let frame = &buf[start..];
    let mut r = ByteReader::new(frame);

    let command = r.u8()?;
    let index = r.u16_le()?;
    let length = r.u16_le()?;
    if usize::from(length) > MAX_RX_PAYLOAD {
        return Err(FrameError::PayloadTooLarge);
    }
    let body = r.take(usize::from(length))?;
    let checksum = r.u8()?;

    let expected = checksum8(checksum8(0, &frame[..HEADER_LEN]), body);
    if expected != checksum {
        return Err(FrameError::ChecksumMismatch);
    }

    let payload = (length > 0).then(|| body.to_vec());
    Ok(Message {
        command,
        index,
        length,
        payload,
        checksum,
    })
}

impl Message {
    /// Parse `buf`, normalising any rejection into [`Message::error`].
    ///
    /// Callers must treat an error-coded message as carrying no payload.
    pub fn from_frame(buf: &[u8]) -> Self {
        match parse(buf) {
            Ok(msg) => msg,
            Err(e) => {
                warn!("RPC: rejected frame ({} bytes): {}", buf.len(), e);
                Self::error()
            }
        }
    }
}

// ── Encode ────────────────────────────────────────────────────

/// Encode a message into wire form, preamble included.
///
/// The stored checksum is written as-is; build messages with
/// [`Message::new`] to get a matching one.
pub fn encode(msg: &Message) -> Vec<u8> {
    let payload = msg.payload();
    let mut out = Vec::with_capacity(FRAME_OVERHEAD + payload.len());
    out.extend_from_slice(&[START_CODE; PREAMBLE_LEN]);
    out.extend_from_slice(&msg.header());
    out.extend_from_slice(payload);
    out.push(msg.checksum);
    out
}
