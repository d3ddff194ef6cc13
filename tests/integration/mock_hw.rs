//! Mock hardware adapters for integration tests.
//!
//! Records every motor line change and every persisted record so tests can
//! assert on the full history without touching flash or GPIO.

use core::cell::{Cell, RefCell};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;

use feeder::adapters::device_id::MacAddress;
use feeder::adapters::image_region::MemoryImageRegion;
use feeder::adapters::nvs::validate_config;
use feeder::app::clock::DateTime;
use feeder::app::ports::{
    ConfigError, ConfigPort, FirmwareInfoPort, MotorPort, RtcPort, StorageError, TimeError,
};
use feeder::app::store::ConfigStore;
use feeder::config::{DeviceConfig, Direction, FIRMWARE_VERSION, FirmwareInfo};
use feeder::rpc::codec::encode;
use feeder::rpc::engine::{CommandContext, CommandEngine, Outcome};
use feeder::rpc::message::{DisplayNotice, FeedbackMessage, Message};

pub const TEST_MAC: MacAddress = [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE];

/// Staging region size used by the rig.
pub const IMAGE_CAPACITY: usize = 16 * 1024;

// ── Motor line record ─────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorCall {
    Direction { line: usize, direction: Direction },
    Enable { channel: usize, on: bool },
    StepLow(usize),
    StepToggle(usize),
}

// ── MockMotors ────────────────────────────────────────────────

pub struct MockMotors {
    pub calls: Vec<MotorCall>,
}

#[allow(dead_code)]
impl MockMotors {
    pub const fn new() -> Self {
        Self { calls: Vec::new() }
    }

    pub fn toggles(&self, channel: usize) -> usize {
        self.calls
            .iter()
            .filter(|c| **c == MotorCall::StepToggle(channel))
            .count()
    }

    /// Last enable state written for `channel`.
    pub fn enabled(&self, channel: usize) -> bool {
        self.calls
            .iter()
            .rev()
            .find_map(|c| match *c {
                MotorCall::Enable { channel: ch, on } if ch == channel => Some(on),
                _ => None,
            })
            .unwrap_or(false)
    }
}

impl Default for MockMotors {
    fn default() -> Self {
        Self::new()
    }
}

impl MotorPort for MockMotors {
    fn set_direction(&mut self, line: usize, direction: Direction) {
        self.calls.push(MotorCall::Direction { line, direction });
    }

    fn set_enable(&mut self, channel: usize, on: bool) {
        self.calls.push(MotorCall::Enable { channel, on });
    }

    fn step_low(&mut self, channel: usize) {
        self.calls.push(MotorCall::StepLow(channel));
    }

    fn step_toggle(&mut self, channel: usize) {
        self.calls.push(MotorCall::StepToggle(channel));
    }
}

// ── MockConfig ────────────────────────────────────────────────

/// Config persistence that validates like the NVS adapter and can be told
/// to fail.
pub struct MockConfig {
    pub saved: RefCell<Option<DeviceConfig>>,
    pub saves: Cell<u32>,
    pub fail: Cell<bool>,
}

impl MockConfig {
    pub fn new() -> Self {
        Self {
            saved: RefCell::new(None),
            saves: Cell::new(0),
            fail: Cell::new(false),
        }
    }
}

impl Default for MockConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigPort for MockConfig {
    fn load(&self) -> Result<DeviceConfig, ConfigError> {
        Ok(self.saved.borrow().clone().unwrap_or_default())
    }

    fn save(&self, config: &DeviceConfig) -> Result<(), ConfigError> {
        if self.fail.get() {
            return Err(ConfigError::IoError);
        }
        validate_config(config)?;
        self.saves.set(self.saves.get() + 1);
        *self.saved.borrow_mut() = Some(config.clone());
        Ok(())
    }
}

// ── MockFirmware ──────────────────────────────────────────────

pub struct MockFirmware {
    pub info: RefCell<FirmwareInfo>,
    pub fail: Cell<bool>,
}

impl MockFirmware {
    pub fn new() -> Self {
        Self {
            info: RefCell::new(FirmwareInfo {
                installed_version: FIRMWARE_VERSION,
                installed_length: 4096,
                installed_crc: 0xBEEF,
            }),
            fail: Cell::new(false),
        }
    }
}

impl Default for MockFirmware {
    fn default() -> Self {
        Self::new()
    }
}

impl FirmwareInfoPort for MockFirmware {
    fn load_info(&self) -> Result<FirmwareInfo, StorageError> {
        Ok(*self.info.borrow())
    }

    fn store_info(&self, info: &FirmwareInfo) -> Result<(), StorageError> {
        if self.fail.get() {
            return Err(StorageError::IoError);
        }
        *self.info.borrow_mut() = *info;
        Ok(())
    }
}

// ── MockRtc ───────────────────────────────────────────────────

pub struct MockRtc {
    pub now: DateTime,
}

impl MockRtc {
    pub fn at(hour: u8, minute: u8) -> Self {
        Self {
            now: DateTime {
                year: 2024,
                month: 6,
                day: 15,
                hour,
                minute,
                second: 0,
            },
        }
    }
}

impl RtcPort for MockRtc {
    fn now(&self) -> DateTime {
        self.now
    }

    fn set(&mut self, time: &DateTime) -> Result<(), TimeError> {
        self.now = *time;
        Ok(())
    }
}

// ── Rig ───────────────────────────────────────────────────────

/// Command engine wired to mocks and local queues.
pub struct Rig {
    pub engine: CommandEngine,
    pub store: ConfigStore,
    pub config: MockConfig,
    pub firmware: MockFirmware,
    pub image: MemoryImageRegion,
    pub rtc: MockRtc,
    pub camera: Signal<CriticalSectionRawMutex, ()>,
    pub feedback: Channel<CriticalSectionRawMutex, FeedbackMessage, 8>,
    pub display: Channel<CriticalSectionRawMutex, DisplayNotice, 8>,
}

#[allow(dead_code)]
impl Rig {
    pub fn new() -> Self {
        Self::with_echo(false)
    }

    pub fn with_echo(echo_command_status: bool) -> Self {
        Self {
            engine: CommandEngine::new(TEST_MAC, FIRMWARE_VERSION, echo_command_status),
            store: ConfigStore::new(DeviceConfig::default()),
            config: MockConfig::new(),
            firmware: MockFirmware::new(),
            image: MemoryImageRegion::new(IMAGE_CAPACITY),
            rtc: MockRtc::at(0, 0),
            camera: Signal::new(),
            feedback: Channel::new(),
            display: Channel::new(),
        }
    }

    /// Dispatch an already-parsed message.
    pub fn handle(&mut self, client_id: u8, message: Message) -> Outcome {
        let fb = self.feedback.sender();
        let disp = self.display.sender();
        let mut ctx = CommandContext {
            store: &self.store,
            config: &self.config,
            firmware: &self.firmware,
            image: &mut self.image,
            rtc: &mut self.rtc,
            camera: &self.camera,
            feedback: &fb,
            display: &disp,
        };
        self.engine.handle(client_id, message, &mut ctx)
    }

    /// Encode, parse and dispatch, as the client task does.
    pub fn send(&mut self, client_id: u8, command: u8, index: u16, payload: &[u8]) -> Outcome {
        let wire = encode(&Message::new(command, index, Some(payload.to_vec())));
        self.handle(client_id, Message::from_frame(&wire))
    }

    /// Next queued feedback frame. Panics if there is none.
    pub fn take_feedback(&self) -> FeedbackMessage {
        self.feedback.try_receive().expect("feedback frame queued")
    }

    pub fn take_notice(&self) -> DisplayNotice {
        self.display.try_receive().expect("display notice queued")
    }
}

impl Default for Rig {
    fn default() -> Self {
        Self::new()
    }
}
