//! Feed service, the time-driven half of the core.
//!
//! [`FeedService`] owns the schedule cursor and the motor driver state.
//! Each control period it reads the clock, lets the scheduler queue any
//! due feed onto the [`MotorGroup`], then advances the driver one step.
//! All I/O flows through ports injected at the call site.
//!
//! ```text
//!      RtcPort ──▶ ┌──────────────────────────┐ ──▶ StepTimerPort
//!                  │       FeedService        │
//!  ConfigStore ──▶ │ FeedScheduler · Driver   │ ──▶ SharedMotorPort
//!                  └──────────────────────────┘
//! ```

use log::info;

use crate::app::ports::{MotorPort, RtcPort, StepTimerPort};
use crate::app::store::ConfigStore;
use crate::motor::{DriverState, MotorDriver, MotorGroup, SharedMotorPort};
use crate::scheduler::FeedScheduler;

/// What one control tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    /// Schedule entry applied this tick, if any.
    pub fired: Option<usize>,
    pub driver: DriverState,
}

pub struct FeedService {
    scheduler: FeedScheduler,
    driver: MotorDriver,
    tick_count: u64,
}

impl FeedService {
    pub const fn new() -> Self {
        Self {
            scheduler: FeedScheduler::new(),
            driver: MotorDriver::new(),
            tick_count: 0,
        }
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn driver_state(&self) -> DriverState {
        self.driver.state()
    }

    /// Run one control period.
    ///
    /// The config lock is held only while the scheduler copies calibration
    /// into the channels; no port is called under it.
    pub fn tick<M: MotorPort>(
        &mut self,
        store: &ConfigStore,
        group: &MotorGroup,
        rtc: &dyn RtcPort,
        motors: &SharedMotorPort<M>,
        timer: &mut dyn StepTimerPort,
    ) -> TickReport {
        self.tick_count += 1;
        let now = rtc.now();
        let fired = store.read(|cfg| self.scheduler.tick(&now, cfg, group));
        if let Some(i) = fired {
            info!("FeedService: schedule entry {} fired at {}", i, now);
        }
        self.driver.tick(group, motors, timer);
        TickReport {
            fired,
            driver: self.driver.state(),
        }
    }
}

impl Default for FeedService {
    fn default() -> Self {
        Self::new()
    }
}
