//! Log-based display and camera adapters.
//!
//! The status display and camera live on other boards. Until their tasks
//! are wired up, these drain the display queue and camera signal to the
//! ESP-IDF logger (UART / USB-CDC in production).

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Receiver;
use embassy_sync::signal::Signal;
use log::info;

use crate::rpc::message::DisplayNotice;

/// Writes each [`DisplayNotice`] as one log line.
pub struct LogDisplay;

impl LogDisplay {
    pub fn new() -> Self {
        Self
    }

    pub fn show(&mut self, notice: &DisplayNotice) {
        info!("DISPLAY | {} | {}", notice.line1, notice.line2);
    }

    /// Show every queued notice. Returns how many were shown.
    pub fn drain<M: RawMutex, const N: usize>(
        &mut self,
        notices: &Receiver<'_, M, DisplayNotice, N>,
    ) -> usize {
        let mut shown = 0;
        while let Ok(notice) = notices.try_receive() {
            self.show(&notice);
            shown += 1;
        }
        shown
    }
}

impl Default for LogDisplay {
    fn default() -> Self {
        Self::new()
    }
}

/// Consume a pending capture request, logging it. Returns whether one was
/// pending.
pub fn take_camera_request<M: RawMutex>(signal: &Signal<M, ()>) -> bool {
    if signal.try_take().is_some() {
        info!("CAMERA | capture requested");
        true
    } else {
        false
    }
}
