//! One-shot hardware peripheral initialization.
//!
//! Configures the stepper GPIO directions using raw ESP-IDF sys calls and
//! parks every driver disabled. Called once from `main()` before any task
//! is spawned.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

use core::convert::Infallible;

use embedded_hal::digital::{ErrorType, OutputPin, StatefulOutputPin};

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    GpioConfigFailed(i32),
    TimerCreateFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
            Self::TimerCreateFailed(rc) => write!(f, "step timer create failed (rc={})", rc),
        }
    }
}

#[cfg(target_os = "espidf")]
use log::info;

#[cfg(target_os = "espidf")]
use crate::pins;

// ── GPIO Outputs ──────────────────────────────────────────────

/// Configure all step, direction and enable lines as outputs.
///
/// Step and direction start LOW; enables start HIGH (drivers released).
#[cfg(target_os = "espidf")]
pub fn init_motor_outputs() -> Result<(), HwInitError> {
    let groups: [(&[i32], u32); 3] = [
        (&pins::MOTOR_STEP_GPIOS, 0),
        (&pins::MOTOR_DIR_GPIOS, 0),
        (&pins::MOTOR_EN_GPIOS, 1),
    ];

    for (gpios, idle_level) in groups {
        for &pin in gpios {
            let cfg = gpio_config_t {
                pin_bit_mask: 1u64 << pin,
                mode: gpio_mode_t_GPIO_MODE_OUTPUT,
                pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
                pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
                intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
            };
            // SAFETY: called once from main() before any task touches these
            // pins; `cfg` lives for the duration of the call.
            let ret = unsafe { gpio_config(&cfg) };
            if ret != ESP_OK as i32 {
                return Err(HwInitError::GpioConfigFailed(ret));
            }
            // SAFETY: pin was configured as an output just above.
            unsafe { gpio_set_level(pin, idle_level) };
        }
    }

    info!("hw_init: {} stepper outputs configured", 3 * pins::MOTOR_STEP_GPIOS.len());
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_motor_outputs() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): stepper output init skipped");
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_write(pin: i32, high: bool) {
    // SAFETY: gpio_set_level writes to an already-configured output pin;
    // pin was validated during init_motor_outputs().
    unsafe {
        gpio_set_level(pin, u32::from(high));
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_write(_pin: i32, _high: bool) {}

// ── embedded-hal pin ─────────────────────────────────────────

/// An output GPIO driven through [`gpio_write`], with its level cached so
/// reads and toggles never touch the register.
#[derive(Debug)]
pub struct RawOutputPin {
    gpio: i32,
    level: bool,
}

impl RawOutputPin {
    /// Wrap a pin already configured by [`init_motor_outputs`].
    pub const fn new(gpio: i32, level: bool) -> Self {
        Self { gpio, level }
    }

    pub fn gpio(&self) -> i32 {
        self.gpio
    }
}

impl ErrorType for RawOutputPin {
    type Error = Infallible;
}

impl OutputPin for RawOutputPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.level = false;
        gpio_write(self.gpio, false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.level = true;
        gpio_write(self.gpio, true);
        Ok(())
    }
}

impl StatefulOutputPin for RawOutputPin {
    fn is_set_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.level)
    }

    fn is_set_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.level)
    }
}
