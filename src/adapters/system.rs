//! Chip-level restart.
//!
//! Implements [`SystemPort`]. A restart is abrupt: the calling task sleeps
//! for the requested delay so the feedback frame can leave, then resets the
//! chip. Nothing else is drained.

use log::warn;

use crate::app::ports::{RestartRequest, SystemPort};

#[derive(Debug, Default)]
pub struct ChipSystem {
    /// Restarts requested so far (simulation only).
    #[cfg(not(target_os = "espidf"))]
    requested: Vec<RestartRequest>,
}

impl ChipSystem {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn requested(&self) -> &[RestartRequest] {
        &self.requested
    }
}

impl SystemPort for ChipSystem {
    #[cfg(target_os = "espidf")]
    fn restart(&mut self, request: RestartRequest) {
        std::thread::sleep(request.delay);
        warn!("System: restarting ({:?})", request.reason);
        esp_ota::restart();
    }

    #[cfg(not(target_os = "espidf"))]
    fn restart(&mut self, request: RestartRequest) {
        warn!(
            "System(sim): restart ({:?}) after {} ms, ignored",
            request.reason,
            request.delay.as_millis()
        );
        self.requested.push(request);
    }
}
