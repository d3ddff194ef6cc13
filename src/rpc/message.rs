//! Protocol message types and command codes.

use core::fmt::Write as _;

use super::checksum::checksum8;

/// Transport-assigned identifier of the client that sent a frame.
pub type ClientId = u8;

// ── Command codes ────────────────────────────────────────────

/// Every command code the dispatcher recognises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    GetMacAddress = 0x01,
    GetCameraImage = 0x02,
    GetState = 0x03,
    GetFirmwareVersion = 0x04,
    GetId = 0x05,

    SetWebAccount = 0x11,
    SetWifi = 0x12,
    SetMotor = 0x13,
    SetTime = 0x14,
    SetSchedule = 0x15,

    /// Device-originated pushes. The device never accepts these as requests.
    PushImage = 0x21,
    PushWebAccount = 0x22,
    PushAlarm = 0x23,

    OtaUpdateRequest = 0x31,
    OtaBinData = 0x32,
    OtaVerify = 0x33,

    FactoryNew = 0x41,

    FeedbackOk = 0xF0,
    FeedbackUpdated = 0xF1,
    FeedbackError = 0xFF,
}

impl Command {
    pub fn from_u8(code: u8) -> Option<Self> {
        Some(match code {
            0x01 => Self::GetMacAddress,
            0x02 => Self::GetCameraImage,
            0x03 => Self::GetState,
            0x04 => Self::GetFirmwareVersion,
            0x05 => Self::GetId,
            0x11 => Self::SetWebAccount,
            0x12 => Self::SetWifi,
            0x13 => Self::SetMotor,
            0x14 => Self::SetTime,
            0x15 => Self::SetSchedule,
            0x21 => Self::PushImage,
            0x22 => Self::PushWebAccount,
            0x23 => Self::PushAlarm,
            0x31 => Self::OtaUpdateRequest,
            0x32 => Self::OtaBinData,
            0x33 => Self::OtaVerify,
            0x41 => Self::FactoryNew,
            0xF0 => Self::FeedbackOk,
            0xF1 => Self::FeedbackUpdated,
            0xFF => Self::FeedbackError,
            _ => return None,
        })
    }

    pub const fn code(self) -> u8 {
        self as u8
    }
}

/// Status byte: request handled.
pub const FB_OK: u8 = Command::FeedbackOk as u8;
/// Status byte: request was valid but nothing changed (OTA already current).
pub const FB_UPDATED: u8 = Command::FeedbackUpdated as u8;
/// Status byte: generic failure. Never carries a payload.
pub const FB_ERROR: u8 = Command::FeedbackError as u8;

/// Outcome of a handled request, before it is mapped to a wire code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Updated,
    Error,
}

impl Status {
    /// Wire status byte. Under the echo convention a successful request is
    /// acknowledged with its own command code instead of [`FB_OK`].
    pub fn wire_code(self, command: u8, echo_command: bool) -> u8 {
        match self {
            Self::Ok if echo_command => command,
            Self::Ok => FB_OK,
            Self::Updated => FB_UPDATED,
            Self::Error => FB_ERROR,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Updated => "Updated",
            Self::Error => "Error",
        }
    }
}

// ── Message ──────────────────────────────────────────────────

/// Size of the fixed header: command(1) index(2) length(2).
pub const HEADER_LEN: usize = 5;

/// One parsed protocol frame.
///
/// The payload is owned; handing the message to the dispatcher by value
/// releases it once handling finishes, on every path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub command: u8,
    pub index: u16,
    pub length: u16,
    pub payload: Option<Vec<u8>>,
    pub checksum: u8,
}

impl Message {
    /// Build a message and compute its length and checksum.
    ///
    /// An empty payload is stored as `None`. Payloads longer than
    /// `u16::MAX` are cut to fit the length field.
    pub fn new(command: u8, index: u16, payload: Option<Vec<u8>>) -> Self {
        let payload = payload
            .map(|mut p| {
                p.truncate(usize::from(u16::MAX));
                p
            })
            .filter(|p| !p.is_empty());
        let length = payload.as_ref().map_or(0, |p| p.len() as u16);
        let mut msg = Self {
            command,
            index,
            length,
            payload,
            checksum: 0,
        };
        msg.checksum = msg.compute_checksum();
        msg
    }

    /// The normalised rejection message: generic error code, no payload.
    pub fn error() -> Self {
        Self::new(FB_ERROR, 0, None)
    }

    pub fn header(&self) -> [u8; HEADER_LEN] {
        let index = self.index.to_le_bytes();
        let length = self.length.to_le_bytes();
        [self.command, index[0], index[1], length[0], length[1]]
    }

    /// Payload bytes, empty when absent.
    pub fn payload(&self) -> &[u8] {
        self.payload.as_deref().unwrap_or(&[])
    }

    /// Checksum over the header, extended over the payload if present.
    pub fn compute_checksum(&self) -> u8 {
        let seed = checksum8(0, &self.header());
        match &self.payload {
            Some(p) => checksum8(seed, p),
            None => seed,
        }
    }
}

/// A response bound for one client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackMessage {
    pub client_id: ClientId,
    pub message: Message,
}

impl FeedbackMessage {
    /// Build a feedback frame for `status_code`.
    ///
    /// A [`FB_ERROR`] status drops any payload the handler built and forces
    /// index and length to zero before the checksum is computed.
    pub fn build(client_id: ClientId, status_code: u8, index: u16, payload: Option<Vec<u8>>) -> Self {
        let message = if status_code == FB_ERROR {
            Message::new(FB_ERROR, 0, None)
        } else {
            Message::new(status_code, index, payload)
        };
        Self { client_id, message }
    }
}

// ── Display notice ───────────────────────────────────────────

pub type DisplayLine = heapless::String<20>;

/// Two-line notice for the status display describing the last command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayNotice {
    pub line1: DisplayLine,
    pub line2: DisplayLine,
}

impl DisplayNotice {
    pub fn for_command(command: u8, status: Status) -> Self {
        let mut line1 = DisplayLine::new();
        let _ = line1.push_str("DBG: TCP");
        let mut line2 = DisplayLine::new();
        let _ = write!(line2, "CMD:{:02X} {}", command, status.label());
        Self { line1, line2 }
    }
}
