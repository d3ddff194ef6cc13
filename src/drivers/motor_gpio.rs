//! Stepper bank over `embedded-hal` output pins.
//!
//! Implements [`MotorPort`] for any pin type with readable output state, so
//! the same bank drives raw ESP-IDF GPIOs on the board and plain mock pins
//! in host tests.
//!
//! | Line   | Level                         |
//! |--------|-------------------------------|
//! | STEP   | toggled once per timer tick   |
//! | DIR    | HIGH = left, LOW = right      |
//! | ENABLE | LOW = energised (active-low)  |
//!
//! Pin errors are dropped: the callers run inside the step timer callback
//! and have nowhere to report them.

use embedded_hal::digital::{OutputPin, StatefulOutputPin};

use crate::app::ports::MotorPort;
use crate::config::{CHANNEL_COUNT, Direction};

use super::hw_init::RawOutputPin;

/// The three lines of one stepper driver.
pub struct MotorPins<P> {
    pub step: P,
    pub dir: P,
    pub enable: P,
}

pub struct GpioMotorBank<P> {
    channels: [MotorPins<P>; CHANNEL_COUNT],
}

impl<P: StatefulOutputPin> GpioMotorBank<P> {
    pub fn new(channels: [MotorPins<P>; CHANNEL_COUNT]) -> Self {
        Self { channels }
    }

    pub fn pins(&mut self, channel: usize) -> Option<&mut MotorPins<P>> {
        self.channels.get_mut(channel)
    }
}

impl GpioMotorBank<RawOutputPin> {
    /// The board's stepper wiring from [`crate::pins`], all drivers released.
    pub fn board() -> Self {
        use crate::pins::{MOTOR_DIR_GPIOS, MOTOR_EN_GPIOS, MOTOR_STEP_GPIOS};
        Self::new(core::array::from_fn(|n| MotorPins {
            step: RawOutputPin::new(MOTOR_STEP_GPIOS[n], false),
            dir: RawOutputPin::new(MOTOR_DIR_GPIOS[n], false),
            enable: RawOutputPin::new(MOTOR_EN_GPIOS[n], true),
        }))
    }
}

impl<P: StatefulOutputPin> MotorPort for GpioMotorBank<P> {
    fn set_direction(&mut self, line: usize, direction: Direction) {
        if let Some(pins) = self.channels.get_mut(line) {
            let _ = match direction {
                Direction::Left => pins.dir.set_high(),
                Direction::Right => pins.dir.set_low(),
            };
        }
    }

    fn set_enable(&mut self, channel: usize, on: bool) {
        if let Some(pins) = self.channels.get_mut(channel) {
            let _ = if on {
                pins.enable.set_low()
            } else {
                pins.enable.set_high()
            };
        }
    }

    fn step_low(&mut self, channel: usize) {
        if let Some(pins) = self.channels.get_mut(channel) {
            let _ = pins.step.set_low();
        }
    }

    fn step_toggle(&mut self, channel: usize) {
        if let Some(pins) = self.channels.get_mut(channel) {
            let _ = pins.step.toggle();
        }
    }
}
