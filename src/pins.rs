//! GPIO pin assignments for the feeder main board.
//!
//! Single source of truth: every driver references this module rather than
//! hard-coding pin numbers. Change a pin here and it propagates everywhere.

use crate::config::CHANNEL_COUNT;

// ---------------------------------------------------------------------------
// Stepper drivers (A4988-class: STEP / DIR / nENABLE per channel)
// ---------------------------------------------------------------------------

/// Step pulse outputs, channel 1 first. Toggled from the step timer.
pub const MOTOR_STEP_GPIOS: [i32; CHANNEL_COUNT] = [4, 5, 6, 7, 15];

/// Direction outputs. HIGH = left.
pub const MOTOR_DIR_GPIOS: [i32; CHANNEL_COUNT] = [16, 17, 18, 8, 3];

/// Driver enable outputs, active LOW.
pub const MOTOR_EN_GPIOS: [i32; CHANNEL_COUNT] = [9, 10, 11, 12, 13];

