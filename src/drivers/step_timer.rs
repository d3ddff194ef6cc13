//! Step clock using ESP-IDF's esp_timer API.
//!
//! One periodic timer paces every stepper channel; the
//! [`MotorDriver`](crate::motor::MotorDriver) reprograms its period when it
//! hands the clock to the next channel. Each expiry calls
//! [`MotorGroup::on_step_tick`].
//!
//! Timer callbacks execute in the ESP timer task context (not ISR), so the
//! critical-section lock around the motor outputs is safe to take there.
//! On simulation targets the timer records its period and expiries are
//! delivered by hand with [`StepTimer::fire`].

use crate::app::ports::{MotorPort, StepTimerPort};
use crate::motor::{MotorGroup, SharedMotorPort};

use super::hw_init::HwInitError;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::{info, warn};

/// Shortest period esp_timer will run periodically without starving the
/// timer task, in µs.
pub const MIN_PERIOD_US: u32 = 50;

/// What the timer callback needs. Leaked once at start-up.
struct TickContext<M: 'static> {
    group: &'static MotorGroup,
    port: &'static SharedMotorPort<M>,
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn step_tick_cb<M: MotorPort + 'static>(arg: *mut core::ffi::c_void) {
    // SAFETY: `arg` is the leaked `TickContext<M>` registered in `start()`;
    // it is never freed and only read here.
    let ctx = unsafe { &*(arg as *const TickContext<M>) };
    ctx.group.on_step_tick(ctx.port);
}

/// The hardware step clock.
#[cfg(target_os = "espidf")]
pub struct StepTimer {
    handle: esp_timer_handle_t,
    period: u32,
}

// SAFETY: the esp_timer handle may be used from any task; the StepTimer
// itself is owned by the feed service thread alone.
#[cfg(target_os = "espidf")]
unsafe impl Send for StepTimer {}

#[cfg(target_os = "espidf")]
impl StepTimer {
    /// Create the timer, stopped. The callback is bound to `group`/`port`
    /// for the life of the program.
    pub fn start<M: MotorPort + Send + 'static>(
        group: &'static MotorGroup,
        port: &'static SharedMotorPort<M>,
    ) -> Result<Self, HwInitError> {
        let ctx: &'static TickContext<M> = Box::leak(Box::new(TickContext { group, port }));
        let args = esp_timer_create_args_t {
            callback: Some(step_tick_cb::<M>),
            arg: ctx as *const TickContext<M> as *mut core::ffi::c_void,
            dispatch_method: esp_timer_dispatch_t_ESP_TIMER_TASK,
            name: b"step\0".as_ptr() as *const _,
            skip_unhandled_events: true,
        };
        let mut handle: esp_timer_handle_t = core::ptr::null_mut();
        // SAFETY: `args` outlives the call and `ctx` is 'static.
        let ret = unsafe { esp_timer_create(&args, &mut handle) };
        if ret != ESP_OK as i32 {
            return Err(HwInitError::TimerCreateFailed(ret));
        }
        info!("step_timer: created (stopped)");
        Ok(Self { handle, period: 0 })
    }
}

#[cfg(target_os = "espidf")]
impl StepTimerPort for StepTimer {
    fn set_period(&mut self, period: u32) {
        // SAFETY: `handle` came from esp_timer_create and is never deleted.
        unsafe {
            if self.period != 0 {
                esp_timer_stop(self.handle);
            }
            self.period = period;
            if period == 0 {
                return;
            }
            let us = u64::from(period.max(MIN_PERIOD_US));
            let ret = esp_timer_start_periodic(self.handle, us);
            if ret != ESP_OK as i32 {
                warn!("step_timer: start at {} µs failed (rc={})", us, ret);
                self.period = 0;
            }
        }
    }
}

/// Simulation step clock. Remembers the programmed period and lets the
/// caller fire expiries by hand.
#[cfg(not(target_os = "espidf"))]
pub struct StepTimer {
    period: u32,
    tick: Box<dyn Fn() + Send>,
}

#[cfg(not(target_os = "espidf"))]
impl StepTimer {
    pub fn start<M: MotorPort + Send + 'static>(
        group: &'static MotorGroup,
        port: &'static SharedMotorPort<M>,
    ) -> Result<Self, HwInitError> {
        let ctx = TickContext { group, port };
        log::info!("step_timer(sim): created, ticks driven manually");
        Ok(Self {
            period: 0,
            tick: Box::new(move || ctx.group.on_step_tick(ctx.port)),
        })
    }

    pub fn period(&self) -> u32 {
        self.period
    }

    /// Deliver one expiry if the clock is running.
    pub fn fire(&self) -> bool {
        if self.period == 0 {
            return false;
        }
        (self.tick)();
        true
    }
}

#[cfg(not(target_os = "espidf"))]
impl StepTimerPort for StepTimer {
    fn set_period(&mut self, period: u32) {
        if period == 0 {
            log::debug!("step_timer(sim): stopped");
        } else {
            log::debug!("step_timer(sim): period {} µs", period.max(MIN_PERIOD_US));
        }
        self.period = period;
    }
}
