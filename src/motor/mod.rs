//! Five-channel stepper bank.
//!
//! Two contexts share a [`MotorGroup`]:
//!
//! - the feed service runs [`MotorDriver::tick`] on its control period and
//!   walks the channels strictly in order, one at a time;
//! - the step timer calls [`MotorGroup::on_step_tick`] at the programmed
//!   period and toggles the step output of the running channel.
//!
//! ```text
//!   FeedScheduler ──add_steps──▶ ┌──────────────────┐ ◀──on_step_tick── step timer
//!                                │ MotorGroup       │        │
//!   MotorDriver  ──enable/dir──▶ │  [MotorChannel;5]│        ▼
//!        │                       └──────────────────┘  SharedMotorPort ──▶ GPIO
//!        └──set_period──▶ StepTimerPort
//! ```
//!
//! `pending_steps` only grows from the scheduler and only shrinks from the
//! step tick. Both sides use atomic read-modify-write, so neither can tear
//! the other's update. Output lines are guarded by a short critical section.

use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use log::{debug, info};

use crate::app::ports::{MotorPort, StepTimerPort};
use crate::config::{CHANNEL_COUNT, DEFAULT_FREQUENCY_HZ, Direction, STEP_CLOCK_HZ};

const DIR_LEFT: u8 = 0;
const DIR_RIGHT: u8 = 1;

const DEFAULT_PERIOD: u32 = STEP_CLOCK_HZ / (DEFAULT_FREQUENCY_HZ as u32 * 2);

/// Direction output line driven for `channel` turning `direction`.
///
/// The board routes channel 2 "left" (index 1) onto channel 3's direction
/// line. Kept as wired; callers must not assume `line == channel`.
pub fn direction_line(channel: usize, direction: Direction) -> usize {
    if channel == 1 && direction == Direction::Left {
        2
    } else {
        channel
    }
}

// ── Channel state ────────────────────────────────────────────

pub struct MotorChannel {
    direction: AtomicU8,
    /// Step-clock ticks per half step.
    period: AtomicU32,
    /// Output toggles still owed (two per full step).
    pending_steps: AtomicU32,
    enabled: AtomicBool,
}

impl MotorChannel {
    pub const fn new() -> Self {
        Self {
            direction: AtomicU8::new(DIR_RIGHT),
            period: AtomicU32::new(DEFAULT_PERIOD),
            pending_steps: AtomicU32::new(0),
            enabled: AtomicBool::new(false),
        }
    }

    pub fn direction(&self) -> Direction {
        if self.direction.load(Ordering::Acquire) == DIR_LEFT {
            Direction::Left
        } else {
            Direction::Right
        }
    }

    pub fn set_direction(&self, direction: Direction) {
        let raw = match direction {
            Direction::Left => DIR_LEFT,
            Direction::Right => DIR_RIGHT,
        };
        self.direction.store(raw, Ordering::Release);
    }

    pub fn period(&self) -> u32 {
        self.period.load(Ordering::Acquire)
    }

    pub fn set_period(&self, period: u32) {
        self.period.store(period, Ordering::Release);
    }

    pub fn pending_steps(&self) -> u32 {
        self.pending_steps.load(Ordering::Acquire)
    }

    /// Queue more toggles. Saturates at `u32::MAX`.
    pub fn add_steps(&self, toggles: u32) {
        let _ = self
            .pending_steps
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |p| {
                Some(p.saturating_add(toggles))
            });
    }

    /// Consume one toggle. Returns `false` if none were pending.
    fn take_step(&self) -> bool {
        self.pending_steps
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |p| p.checked_sub(1))
            .is_ok()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    fn set_enabled(&self, on: bool) {
        self.enabled.store(on, Ordering::Release);
    }
}

impl Default for MotorChannel {
    fn default() -> Self {
        Self::new()
    }
}

// ── Group ────────────────────────────────────────────────────

/// All channels plus the period the shared step timer currently runs at.
///
/// `const`-constructible so it can live in a `static` shared with the
/// timer callback.
pub struct MotorGroup {
    channels: [MotorChannel; CHANNEL_COUNT],
    /// `0` while the timer is stopped.
    timer_period: AtomicU32,
}

impl MotorGroup {
    pub const fn new() -> Self {
        Self {
            channels: [const { MotorChannel::new() }; CHANNEL_COUNT],
            timer_period: AtomicU32::new(0),
        }
    }

    pub fn channel(&self, index: usize) -> &MotorChannel {
        &self.channels[index]
    }

    pub fn channels(&self) -> &[MotorChannel; CHANNEL_COUNT] {
        &self.channels
    }

    pub fn timer_period(&self) -> u32 {
        self.timer_period.load(Ordering::Acquire)
    }

    fn program_timer(&self, timer: &mut dyn StepTimerPort, period: u32) {
        timer.set_period(period);
        self.timer_period.store(period, Ordering::Release);
    }

    /// `true` when no channel owes any steps.
    pub fn is_idle(&self) -> bool {
        self.channels.iter().all(|c| c.pending_steps() == 0)
    }

    /// Step timer callback.
    ///
    /// Services the first enabled channel only: toggles its step output if
    /// it still owes steps, otherwise releases it. Never blocks.
    pub fn on_step_tick<M: MotorPort>(&self, port: &SharedMotorPort<M>) {
        let Some((n, ch)) = self.channels.iter().enumerate().find(|(_, c)| c.is_enabled()) else {
            return;
        };
        if ch.take_step() {
            port.with(|p| p.step_toggle(n));
        } else {
            port.with(|p| {
                p.step_low(n);
                p.set_enable(n, false);
            });
            ch.set_enabled(false);
        }
    }
}

impl Default for MotorGroup {
    fn default() -> Self {
        Self::new()
    }
}

// ── Shared output lines ──────────────────────────────────────

/// Motor outputs shared between the driver and the step timer callback.
pub struct SharedMotorPort<M> {
    inner: Mutex<CriticalSectionRawMutex, RefCell<M>>,
}

impl<M: MotorPort> SharedMotorPort<M> {
    pub const fn new(port: M) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(port)),
        }
    }

    /// Run `f` with exclusive access to the outputs. Keep it short.
    pub fn with<R>(&self, f: impl FnOnce(&mut M) -> R) -> R {
        self.inner.lock(|p| f(&mut p.borrow_mut()))
    }
}

// ── Driver ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Idle,
    /// Channel `n` (0-based) owns the step timer.
    Run(usize),
}

/// Serialises work through the channels in fixed order 1→5.
pub struct MotorDriver {
    state: DriverState,
}

impl MotorDriver {
    pub const fn new() -> Self {
        Self {
            state: DriverState::Idle,
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Advance the driver by one control period.
    pub fn tick<M: MotorPort>(
        &mut self,
        group: &MotorGroup,
        port: &SharedMotorPort<M>,
        timer: &mut dyn StepTimerPort,
    ) {
        match self.state {
            DriverState::Idle => {
                if !group.is_idle() {
                    debug!("Motor: work queued, starting at channel 1");
                    self.state = DriverState::Run(0);
                } else if group.timer_period() != 0 {
                    group.program_timer(timer, 0);
                    info!("Motor: all channels done, step timer stopped");
                }
            }
            DriverState::Run(n) => self.run_channel(n, group, port, timer),
        }
    }

    fn run_channel<M: MotorPort>(
        &mut self,
        n: usize,
        group: &MotorGroup,
        port: &SharedMotorPort<M>,
        timer: &mut dyn StepTimerPort,
    ) {
        let ch = group.channel(n);

        if ch.pending_steps() == 0 {
            port.with(|p| {
                p.step_low(n);
                p.set_enable(n, false);
            });
            ch.set_enabled(false);
            self.state = if n + 1 < CHANNEL_COUNT {
                DriverState::Run(n + 1)
            } else {
                DriverState::Idle
            };
            return;
        }

        let period = ch.period();
        if group.timer_period() != period {
            group.program_timer(timer, period);
            port.with(|p| p.step_low(n));
            debug!("Motor: ch{} timer period {} ticks", n + 1, period);
        }

        if !ch.is_enabled() {
            let dir = ch.direction();
            port.with(|p| {
                p.set_direction(direction_line(n, dir), dir);
                p.step_low(n);
                p.set_enable(n, true);
            });
            ch.set_enabled(true);
            info!(
                "Motor: ch{} running {:?}, {} toggles",
                n + 1,
                dir,
                ch.pending_steps()
            );
        }
    }
}

impl Default for MotorDriver {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ────────────────────────────────────────────────────
