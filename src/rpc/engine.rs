//! Command engine: dispatches parsed frames to their handlers.
//!
//! **Transport-decoupled**: the engine does not own a transport. The client
//! task feeds it one [`Message`] at a time; the engine posts the feedback
//! frame and a display notice through the sinks in [`CommandContext`] and
//! reports any restart the command requires back to the caller.
//!
//! Every handler returns a typed [`Result`](crate::error::Result). This
//! module is the only place those errors become wire status codes: every
//! failure is answered with [`FB_ERROR`](super::message::FB_ERROR) and an
//! empty payload.

use core::time::Duration;
use log::{info, warn};

use crate::adapters::device_id::{MacAddress, mac_string};
use crate::app::clock::DateTime;
use crate::app::ports::{
    CameraPort, ConfigPort, DisplaySink, FeedbackSink, FirmwareInfoPort, ImageRegionPort,
    RestartReason, RestartRequest, RtcPort,
};
use crate::app::store::ConfigStore;
use crate::config::{
    ACCOUNT_ID_MAX, ACCOUNT_PASS_MAX, CHANNEL_COUNT, DeviceConfig, Direction,
    MAX_SCHEDULE_ENTRIES, PORT_MAX, SCHEDULE_ENTRY_LEN, SERVER_MAX, SSID_MAX, ScheduleEntry,
    WIFI_PASS_MAX,
};
use crate::error::{Error, Result};

use super::message::{ClientId, Command, DisplayNotice, FeedbackMessage, Message, Status};
use super::ota::{OtaEngine, RequestOutcome};
use super::reader::ByteReader;

/// Delay before entering station mode once both credential sets are stored.
pub const NETWORK_RESTART_DELAY: Duration = Duration::from_millis(1010);
/// Delay before booting a verified image.
pub const OTA_RESTART_DELAY: Duration = Duration::from_millis(3100);
/// Delay before rebooting into factory defaults.
pub const FACTORY_RESTART_DELAY: Duration = Duration::from_millis(1000);

/// `GetState` reply: fixed capability/status flags.
const STATE_FLAGS: [u8; 5] = [0, 0, 1, 1, 0];

/// Minimum `SetMotor` payload: 5 direction bytes, 5 frequencies, 5 step counts.
const SET_MOTOR_LEN: usize = CHANNEL_COUNT * 5;

/// Minimum `SetTime` payload: year(2) month day hour minute second.
const SET_TIME_LEN: usize = 7;

/// Everything a handler may touch, borrowed for one dispatch.
pub struct CommandContext<'a> {
    pub store: &'a ConfigStore,
    pub config: &'a dyn ConfigPort,
    pub firmware: &'a dyn FirmwareInfoPort,
    pub image: &'a mut dyn ImageRegionPort,
    pub rtc: &'a mut dyn RtcPort,
    pub camera: &'a dyn CameraPort,
    pub feedback: &'a dyn FeedbackSink,
    pub display: &'a dyn DisplaySink,
}

/// What dispatch produced, for the caller's bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    /// Wire status byte of the posted feedback; `None` if nothing was sent.
    pub status: Option<u8>,
    /// Reset the firmware must perform now that the response is out.
    pub restart: Option<RestartRequest>,
}

/// A handler's successful result, before it is turned into a frame.
struct Reply {
    status: Status,
    payload: Option<Vec<u8>>,
    restart: Option<RestartRequest>,
    trigger_camera: bool,
}

impl Reply {
    fn ok() -> Self {
        Self {
            status: Status::Ok,
            payload: None,
            restart: None,
            trigger_camera: false,
        }
    }

    fn with_payload(payload: Vec<u8>) -> Self {
        Self {
            payload: Some(payload),
            ..Self::ok()
        }
    }

    fn status(status: Status) -> Self {
        Self {
            status,
            ..Self::ok()
        }
    }

    fn restart_after(mut self, delay: Duration, reason: RestartReason) -> Self {
        self.restart = Some(RestartRequest { delay, reason });
        self
    }
}

pub struct CommandEngine {
    ota: OtaEngine,
    mac: MacAddress,
    firmware_version: u16,
    echo_command_status: bool,
}

impl CommandEngine {
    pub fn new(mac: MacAddress, firmware_version: u16, echo_command_status: bool) -> Self {
        Self {
            ota: OtaEngine::new(firmware_version),
            mac,
            firmware_version,
            echo_command_status,
        }
    }

    pub fn ota(&self) -> &OtaEngine {
        &self.ota
    }

    /// Handle one message, consuming it.
    ///
    /// Posts the feedback and display notice before returning. The payload
    /// is released when `message` drops at the end of this call.
    pub fn handle(
        &mut self,
        client_id: ClientId,
        message: Message,
        ctx: &mut CommandContext<'_>,
    ) -> Outcome {
        let command = message.command;
        let result = match Command::from_u8(command) {
            Some(cmd) => self.dispatch(client_id, cmd, &message, ctx),
            None => {
                warn!("RPC[{}]: unknown command 0x{:02X}", client_id, command);
                Ok(Some(Reply::status(Status::Error)))
            }
        };

        let reply = match result {
            Ok(Some(reply)) => reply,
            Ok(None) => {
                return Outcome {
                    status: None,
                    restart: None,
                };
            }
            Err(e) => {
                warn!("RPC[{}]: cmd 0x{:02X} failed: {}", client_id, command, e);
                Reply::status(Status::Error)
            }
        };

        let code = reply.status.wire_code(command, self.echo_command_status);
        let feedback = FeedbackMessage::build(client_id, code, 0, reply.payload);
        if !ctx.feedback.post(feedback) {
            warn!("RPC[{}]: feedback queue full, dropping response", client_id);
        }
        if !ctx.display.notify(DisplayNotice::for_command(command, reply.status)) {
            warn!("RPC[{}]: display queue full", client_id);
        }
        if reply.trigger_camera {
            ctx.camera.trigger();
        }

        Outcome {
            status: Some(code),
            restart: reply.restart,
        }
    }

    fn dispatch(
        &mut self,
        client_id: ClientId,
        cmd: Command,
        msg: &Message,
        ctx: &mut CommandContext<'_>,
    ) -> Result<Option<Reply>> {
        let p = msg.payload();
        let reply = match cmd {
            Command::GetMacAddress => {
                info!("RPC[{}]: GetMacAddress", client_id);
                let mut out = Vec::with_capacity(18);
                out.extend_from_slice(mac_string(&self.mac).as_bytes());
                out.push(0);
                Reply::with_payload(out)
            }
            Command::GetCameraImage => {
                info!("RPC[{}]: GetCameraImage", client_id);
                Reply {
                    trigger_camera: true,
                    ..Reply::ok()
                }
            }
            Command::GetState => {
                info!("RPC[{}]: GetState", client_id);
                Reply::with_payload(STATE_FLAGS.to_vec())
            }
            Command::GetFirmwareVersion => {
                info!("RPC[{}]: GetFirmwareVersion v{}", client_id, self.firmware_version);
                Reply::with_payload(self.firmware_version.to_le_bytes().to_vec())
            }
            Command::GetId => {
                info!("RPC[{}]: GetId", client_id);
                let mut out = ctx.store.read(|c| c.network.account_id.to_vec());
                out.push(0);
                Reply::with_payload(out)
            }
            Command::SetWebAccount => {
                info!("RPC[{}]: SetWebAccount", client_id);
                set_web_account(p, ctx)?
            }
            Command::SetWifi => {
                info!("RPC[{}]: SetWifi", client_id);
                set_wifi(p, ctx)?
            }
            Command::SetMotor => {
                info!("RPC[{}]: SetMotor", client_id);
                set_motor(p, ctx)?
            }
            Command::SetTime => {
                info!("RPC[{}]: SetTime", client_id);
                set_time(p, ctx)?
            }
            Command::SetSchedule => {
                info!("RPC[{}]: SetSchedule ({} entries)", client_id, p.len() / SCHEDULE_ENTRY_LEN);
                set_schedule(p, ctx)?
            }
            Command::PushImage | Command::PushWebAccount | Command::PushAlarm => {
                warn!("RPC[{}]: push command 0x{:02X} is device-originated", client_id, cmd.code());
                Reply::status(Status::Error)
            }
            Command::OtaUpdateRequest => {
                info!("RPC[{}]: OtaUpdateRequest", client_id);
                match self.ota.request(p, ctx.firmware, ctx.image)? {
                    RequestOutcome::Accepted => Reply::ok(),
                    RequestOutcome::AlreadyUpdated => Reply::status(Status::Updated),
                }
            }
            Command::OtaBinData => {
                log::debug!("RPC[{}]: OtaBinData #{} ({} B)", client_id, msg.index, p.len());
                self.ota.write_packet(msg.index, p, ctx.image)?;
                Reply::ok()
            }
            Command::OtaVerify => {
                info!("RPC[{}]: OtaVerify", client_id);
                self.ota.verify(ctx.firmware, ctx.image)?;
                Reply::ok().restart_after(OTA_RESTART_DELAY, RestartReason::FirmwareUpdated)
            }
            Command::FactoryNew => {
                info!("RPC[{}]: FactoryNew", client_id);
                let status = match ctx.store.commit(ctx.config, |c| *c = DeviceConfig::default()) {
                    Ok(()) => Status::Ok,
                    Err(_) => Status::Error,
                };
                Reply::status(status)
                    .restart_after(FACTORY_RESTART_DELAY, RestartReason::FactoryReset)
            }
            Command::FeedbackOk => {
                info!("RPC[{}]: client feedback OK", client_id);
                return Ok(None);
            }
            Command::FeedbackError => {
                warn!("RPC[{}]: client feedback Error", client_id);
                return Ok(None);
            }
            Command::FeedbackUpdated => Reply::status(Status::Error),
        };
        Ok(Some(reply))
    }
}

// ── Set handlers ─────────────────────────────────────────────

fn bounded<const N: usize>(bytes: &[u8], what: &'static str) -> Result<heapless::Vec<u8, N>> {
    heapless::Vec::from_slice(bytes).map_err(|()| Error::Validation(what))
}

/// Reply for a credential update: restart into station mode once both
/// credential sets are present.
fn credentials_reply(promoted: bool) -> Reply {
    if promoted {
        info!("RPC: credentials complete, switching to station mode");
        Reply::ok().restart_after(NETWORK_RESTART_DELAY, RestartReason::NetworkConfigured)
    } else {
        Reply::ok()
    }
}

/// `[server_len, port_len, id_len, pass_len] server port id pass`
fn set_web_account(p: &[u8], ctx: &mut CommandContext<'_>) -> Result<Reply> {
    let mut r = ByteReader::new(p);
    let server_len = usize::from(r.u8()?);
    let port_len = usize::from(r.u8()?);
    let id_len = usize::from(r.u8()?);
    let pass_len = usize::from(r.u8()?);

    if p.len() != 4 + server_len + port_len + id_len + pass_len {
        return Err(Error::Validation("account field lengths do not match payload"));
    }
    if server_len > SERVER_MAX
        || port_len > PORT_MAX
        || id_len > ACCOUNT_ID_MAX
        || pass_len > ACCOUNT_PASS_MAX
    {
        return Err(Error::Validation("account field too long"));
    }

    let server = bounded::<SERVER_MAX>(r.take(server_len)?, "server")?;
    let port = r.uint_le(port_len)? as u16;
    let id = bounded::<ACCOUNT_ID_MAX>(r.take(id_len)?, "account id")?;
    let pass = bounded::<ACCOUNT_PASS_MAX>(r.take(pass_len)?, "account password")?;

    let promoted = ctx.store.commit(ctx.config, |c| {
        let net = &mut c.network;
        net.server = server;
        net.port = port;
        net.account_id = id;
        net.account_pass = pass;
        net.cloud_configured = true;
        net.promote_if_ready()
    })?;
    Ok(credentials_reply(promoted))
}

/// `[ssid_len, pass_len] ssid pass`
fn set_wifi(p: &[u8], ctx: &mut CommandContext<'_>) -> Result<Reply> {
    let mut r = ByteReader::new(p);
    let ssid_len = usize::from(r.u8()?);
    let pass_len = usize::from(r.u8()?);

    if p.len() < 2 + ssid_len + pass_len {
        return Err(Error::Validation("wifi field lengths exceed payload"));
    }
    if ssid_len > SSID_MAX || pass_len > WIFI_PASS_MAX {
        return Err(Error::Validation("wifi field too long"));
    }

    let ssid = bounded::<SSID_MAX>(r.take(ssid_len)?, "ssid")?;
    let pass = bounded::<WIFI_PASS_MAX>(r.take(pass_len)?, "wifi password")?;

    let promoted = ctx.store.commit(ctx.config, |c| {
        let net = &mut c.network;
        net.ssid = ssid;
        net.wifi_pass = pass;
        net.wifi_configured = true;
        net.promote_if_ready()
    })?;
    Ok(credentials_reply(promoted))
}

/// `dir[5] freq_le[5] steps_le[5]`
fn set_motor(p: &[u8], ctx: &mut CommandContext<'_>) -> Result<Reply> {
    if p.len() < SET_MOTOR_LEN {
        return Err(Error::Validation("motor payload shorter than 25 bytes"));
    }
    let mut r = ByteReader::new(p);
    let dirs = r.take(CHANNEL_COUNT)?;
    let mut freqs = [0u16; CHANNEL_COUNT];
    for f in &mut freqs {
        *f = r.u16_le()?;
    }
    let mut steps = [0u16; CHANNEL_COUNT];
    for s in &mut steps {
        *s = r.u16_le()?;
    }

    ctx.store.commit(ctx.config, |c| {
        for (i, m) in c.motors.iter_mut().enumerate() {
            m.direction = Direction::from_wire(dirs[i]);
            m.frequency_hz = freqs[i];
            m.steps_per_unit = steps[i];
        }
    })?;
    Ok(Reply::ok())
}

/// `year_le(2) month day hour minute second`
fn set_time(p: &[u8], ctx: &mut CommandContext<'_>) -> Result<Reply> {
    if p.len() < SET_TIME_LEN {
        return Err(Error::Validation("time payload shorter than 7 bytes"));
    }
    let mut r = ByteReader::new(p);
    let year = r.u16_le()?;
    let [month, day, hour, minute, second] = [r.u8()?, r.u8()?, r.u8()?, r.u8()?, r.u8()?];
    let time = DateTime::new(year, month, day, hour, minute, second).map_err(Error::Validation)?;
    ctx.rtc.set(&time)?;
    info!("RPC: clock set to {}", time);
    Ok(Reply::ok())
}

/// `n × (hour minute count[5])`, replacing the whole schedule.
fn set_schedule(p: &[u8], ctx: &mut CommandContext<'_>) -> Result<Reply> {
    if p.len() % SCHEDULE_ENTRY_LEN != 0 {
        return Err(Error::Validation("schedule payload not a multiple of 7"));
    }
    if p.len() / SCHEDULE_ENTRY_LEN > MAX_SCHEDULE_ENTRIES {
        return Err(Error::Validation("more than 12 schedule entries"));
    }

    let mut entries = heapless::Vec::<ScheduleEntry, MAX_SCHEDULE_ENTRIES>::new();
    for chunk in p.chunks_exact(SCHEDULE_ENTRY_LEN) {
        let mut feed_counts = [0u8; CHANNEL_COUNT];
        feed_counts.copy_from_slice(&chunk[2..]);
        let entry = ScheduleEntry {
            hour: chunk[0],
            minute: chunk[1],
            feed_counts,
        };
        entries
            .push(entry)
            .map_err(|_| Error::Validation("more than 12 schedule entries"))?;
    }

    ctx.store.commit(ctx.config, |c| c.schedule = entries)?;
    Ok(Reply::ok())
}
