//! Inter-task queues around the command engine.
//!
//! Uses `embassy-sync` bounded MPMC channels to bridge the transport, the
//! client task and the display task. All tasks share these statics without
//! heap allocation.
//!
//! ```text
//! ┌───────────┐ InboundFrame  ┌─────────────┐ FeedbackMessage ┌───────────┐
//! │ Transport │──────────────▶│ Client task │────────────────▶│ Transport │
//! └───────────┘               └──────┬──────┘                 └───────────┘
//!                                    │ DisplayNotice   ┌─────────┐
//!                                    ├────────────────▶│ Display │
//!                                    │ ()              ┌─────────┐
//!                                    └────────────────▶│ Camera  │
//!                                                      └─────────┘
//! ```

use embassy_sync::blocking_mutex::raw::{CriticalSectionRawMutex, RawMutex};
use embassy_sync::channel::{Channel, Sender};
use embassy_sync::signal::Signal;
use heapless::Vec;
use log::warn;

use super::codec::{FRAME_OVERHEAD, MAX_RX_PAYLOAD};
use super::message::{ClientId, DisplayNotice, FeedbackMessage};
use crate::app::ports::{CameraPort, DisplaySink, FeedbackSink};

/// Largest raw frame the transport may hand over, leading noise included.
pub const RX_BUFFER_SIZE: usize = MAX_RX_PAYLOAD + FRAME_OVERHEAD + 16;

/// Raw bytes of one inbound frame.
pub struct InboundFrame {
    /// Which client sent this frame.
    pub client_id: ClientId,
    pub bytes: Vec<u8, RX_BUFFER_SIZE>,
}

/// Channel depth for inbound frames.
const REQUEST_DEPTH: usize = 4;

/// Channel depth for outbound feedback.
const FEEDBACK_DEPTH: usize = 8;

/// Channel depth for display notices.
const DISPLAY_DEPTH: usize = 4;

/// Inbound frames: transport → client task.
pub static REQUEST_CHANNEL: Channel<CriticalSectionRawMutex, InboundFrame, REQUEST_DEPTH> =
    Channel::new();

/// Outbound feedback: client task → transport.
pub static FEEDBACK_CHANNEL: Channel<CriticalSectionRawMutex, FeedbackMessage, FEEDBACK_DEPTH> =
    Channel::new();

/// Status notices: client task → display task.
pub static DISPLAY_CHANNEL: Channel<CriticalSectionRawMutex, DisplayNotice, DISPLAY_DEPTH> =
    Channel::new();

/// Capture request: client task → camera task.
pub static CAMERA_SIGNAL: Signal<CriticalSectionRawMutex, ()> = Signal::new();

// ── Transport-side helpers ───────────────────────────────────

/// Queue a raw frame from the transport. Drops it if the queue is full
/// or the frame is larger than [`RX_BUFFER_SIZE`].
pub fn submit_frame(client_id: ClientId, data: &[u8]) -> bool {
    let Ok(bytes) = Vec::from_slice(data) else {
        warn!("IO[{}]: frame of {} bytes too large for request buffer", client_id, data.len());
        return false;
    };
    if REQUEST_CHANNEL.try_send(InboundFrame { client_id, bytes }).is_err() {
        warn!("IO[{}]: request channel full, dropping frame", client_id);
        return false;
    }
    true
}

/// Take the next feedback frame to transmit, if any.
pub fn try_recv_feedback() -> Option<FeedbackMessage> {
    FEEDBACK_CHANNEL.try_receive().ok()
}

// ── Port implementations ─────────────────────────────────────

impl<M: RawMutex, const N: usize> FeedbackSink for Sender<'_, M, FeedbackMessage, N> {
    fn post(&self, feedback: FeedbackMessage) -> bool {
        self.try_send(feedback).is_ok()
    }
}

impl<M: RawMutex, const N: usize> DisplaySink for Sender<'_, M, DisplayNotice, N> {
    fn notify(&self, notice: DisplayNotice) -> bool {
        self.try_send(notice).is_ok()
    }
}

impl<M: RawMutex> CameraPort for Signal<M, ()> {
    fn trigger(&self) {
        self.signal(());
    }
}
