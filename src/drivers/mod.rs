//! Stepper outputs, step clock, hardware initialisation and task placement.

pub mod hw_init;
pub mod motor_gpio;
pub mod step_timer;
pub mod task_pin;
