//! Feeder firmware library.
//!
//! Exposes the pure-logic modules for integration testing and fuzzing. All
//! ESP-IDF-specific code is guarded by `#[cfg(target_os = "espidf")]`
//! within each module, with a simulation backend alongside it.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod error;
pub mod motor;
pub mod rpc;
pub mod scheduler;

pub mod adapters;
pub mod drivers;

mod pins;
