//! Daily feed scheduler.
//!
//! Walks the configured schedule against wall-clock time and queues step
//! work onto the motor channels. The [`MotorDriver`](crate::motor::MotorDriver)
//! then drains that work channel by channel.
//!
//! ```text
//!   RtcPort::now ──▶ FeedScheduler::tick ──add_steps──▶ MotorGroup
//!                           ▲
//!   ConfigStore::read ──────┘ (schedule + calibration)
//! ```
//!
//! The cursor only moves forward within a day. An entry fires when its
//! `(hour, minute)` equals the current time while the cursor points at it;
//! a day-of-month change rewinds the cursor to the first entry.

use log::{debug, info};

use crate::app::clock::DateTime;
use crate::config::DeviceConfig;
use crate::motor::MotorGroup;

pub struct FeedScheduler {
    /// Next schedule entry to wait for.
    cursor: usize,
    /// Day of month seen on the previous tick.
    last_day: Option<u8>,
}

impl FeedScheduler {
    pub const fn new() -> Self {
        Self {
            cursor: 0,
            last_day: None,
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Evaluate the schedule once.
    ///
    /// Applies at most one entry and returns its index.
    pub fn tick(&mut self, now: &DateTime, config: &DeviceConfig, group: &MotorGroup) -> Option<usize> {
        if self.last_day != Some(now.day) {
            if self.last_day.is_some() {
                debug!("Scheduler: new day ({}), rewinding", now.day);
            }
            self.last_day = Some(now.day);
            self.cursor = 0;
        }

        let entry = config.schedule.get(self.cursor)?;
        if entry.hour != now.hour || entry.minute != now.minute {
            return None;
        }

        for (n, (cal, &count)) in config.motors.iter().zip(entry.feed_counts.iter()).enumerate() {
            let ch = group.channel(n);
            ch.set_direction(cal.direction);
            ch.set_period(cal.period_ticks());
            ch.add_steps(cal.toggles_for(count));
        }

        let fired = self.cursor;
        self.cursor += 1;
        info!(
            "Scheduler: entry {} at {:02}:{:02} queued {:?}",
            fired, entry.hour, entry.minute, entry.feed_counts
        );
        Some(fired)
    }
}

impl Default for FeedScheduler {
    fn default() -> Self {
        Self::new()
    }
}
