//! Application core: pure domain logic, zero I/O.
//!
//! Holds the configuration mirror, the calendar type and the time-driven
//! feed service. All interaction with hardware happens through **port
//! traits** defined in [`ports`], keeping this layer fully testable without
//! real peripherals.

pub mod clock;
pub mod ports;
pub mod service;
pub mod store;
