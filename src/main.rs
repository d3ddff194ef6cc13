//! Feeder firmware: main entry point.
//!
//! Hexagonal layout: pure logic in the library, adapters bound here.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  NvsAdapter     FlashImageRegion   SystemClock    ChipSystem   │
//! │  (Config+FwInfo)(ImageRegionPort)  (RtcPort)      (SystemPort) │
//! │  GpioMotorBank  StepTimer          embassy-sync queues         │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  client task (core 0)            feed task (core 1)            │
//! │  ┌──────────────────────┐        ┌──────────────────────┐      │
//! │  │ codec · CommandEngine│        │ FeedScheduler        │      │
//! │  │ OtaEngine            │        │ MotorDriver          │      │
//! │  └──────────┬───────────┘        └──────────┬───────────┘      │
//! │             └──────── ConfigStore ──────────┘                  │
//! │                                                                │
//! │  step timer callback ──▶ MotorGroup::on_step_tick              │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The link transport is an external collaborator: it feeds
//! [`submit_frame`](feeder::rpc::channels::submit_frame) and drains
//! [`try_recv_feedback`](feeder::rpc::channels::try_recv_feedback).
#![deny(unused_must_use)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use log::{info, warn};

use feeder::adapters::device_id::{mac_string, read_mac};
use feeder::adapters::image_region::{FlashImageRegion, confirm_running_image};
use feeder::adapters::log_sink::{LogDisplay, take_camera_request};
use feeder::adapters::nvs::NvsAdapter;
use feeder::adapters::system::ChipSystem;
use feeder::adapters::time::SystemClock;
use feeder::app::ports::{FirmwareInfoPort, RtcPort};
use feeder::app::service::FeedService;
use feeder::app::store::ConfigStore;
use feeder::config::{FIRMWARE_VERSION, TaskConfig};
use feeder::drivers::hw_init;
use feeder::drivers::motor_gpio::GpioMotorBank;
use feeder::drivers::step_timer::StepTimer;
use feeder::drivers::task_pin::{CLIENT_TASK, FEED_TASK, spawn_on_core};
use feeder::motor::{MotorGroup, SharedMotorPort};
use feeder::rpc::channels::{CAMERA_SIGNAL, DISPLAY_CHANNEL, FEEDBACK_CHANNEL, REQUEST_CHANNEL};
use feeder::rpc::client_task;
use feeder::rpc::engine::{CommandContext, CommandEngine};

/// Channel state shared by the feed task and the step timer callback.
static MOTORS: MotorGroup = MotorGroup::new();

/// How often the main thread drains the display queue and camera signal.
const DISPLAY_POLL: Duration = Duration::from_millis(50);

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    let mac = read_mac();
    info!("╔══════════════════════════════════════╗");
    info!("║  Feeder v{} (fw {})                ║", env!("CARGO_PKG_VERSION"), FIRMWARE_VERSION);
    info!("║  {}                   ║", mac_string(&mac));
    info!("╚══════════════════════════════════════╝");

    confirm_running_image();
    let tasks = TaskConfig::default();

    // ── 2. Hardware ───────────────────────────────────────────
    hw_init::init_motor_outputs().map_err(|e| anyhow!("stepper GPIO init: {}", e))?;
    let outputs: &'static SharedMotorPort<_> =
        Box::leak(Box::new(SharedMotorPort::new(GpioMotorBank::board())));
    let mut step_timer =
        StepTimer::start(&MOTORS, outputs).map_err(|e| anyhow!("step timer: {}", e))?;

    // ── 3. Persistent state ───────────────────────────────────
    let nvs = NvsAdapter::new().map_err(|e| anyhow!("NVS init: {}", e))?;
    let store = Arc::new(ConfigStore::load(&nvs));
    match nvs.load_info() {
        Ok(fw) => info!(
            "Installed image record: v{} ({} bytes, crc {:04X})",
            fw.installed_version, fw.installed_length, fw.installed_crc
        ),
        Err(e) => warn!("Firmware record unreadable: {}", e),
    }
    let image = FlashImageRegion::next_update_slot().map_err(|e| anyhow!("OTA slot: {}", e))?;

    // ── 4. Client task ────────────────────────────────────────
    let client_store = Arc::clone(&store);
    spawn_on_core(CLIENT_TASK, move || {
        let mut image = image;
        let mut clock = SystemClock::new();
        let mut system = ChipSystem::new();
        let feedback = FEEDBACK_CHANNEL.sender();
        let display = DISPLAY_CHANNEL.sender();
        let ctx = CommandContext {
            store: &client_store,
            config: &nvs,
            firmware: &nvs,
            image: &mut image,
            rtc: &mut clock,
            camera: &CAMERA_SIGNAL,
            feedback: &feedback,
            display: &display,
        };
        let engine = CommandEngine::new(mac, FIRMWARE_VERSION, tasks.echo_command_status);
        client_task::run(
            engine,
            REQUEST_CHANNEL.receiver(),
            ctx,
            &mut system,
            Duration::from_millis(u64::from(tasks.request_timeout_ms)),
        )
    })?;

    // ── 5. Feed task ──────────────────────────────────────────
    let feed_store = Arc::clone(&store);
    spawn_on_core(FEED_TASK, move || {
        let clock = SystemClock::new();
        let mut service = FeedService::new();
        let period = Duration::from_millis(u64::from(tasks.control_loop_interval_ms));
        info!("Feed task started (period {} ms, clock {})", period.as_millis(), clock.now());
        loop {
            service.tick(&feed_store, &MOTORS, &clock, outputs, &mut step_timer);
            std::thread::sleep(period);
        }
    })?;

    // ── 6. Display / camera relay ─────────────────────────────
    info!("System ready.");
    let mut display = LogDisplay::new();
    let notices = DISPLAY_CHANNEL.receiver();
    loop {
        display.drain(&notices);
        take_camera_request(&CAMERA_SIGNAL);
        std::thread::sleep(DISPLAY_POLL);
    }
}
