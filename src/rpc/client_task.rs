//! Client task: drains inbound frames through the codec and command engine.
//!
//! Runs in a dedicated thread. Each wake waits on the request channel with
//! a timeout, racing `Receiver::receive()` against an `async-io-mini`
//! reactor timer under `futures_lite::future::block_on` (no busy-spinning),
//! then processes at most one frame.
//!
//! ```text
//!  ┌────────────────────────────────────────────────────────────┐
//!  │  Client Thread                                             │
//!  │  ┌──────────────────────────────────────────────────────┐  │
//!  │  │  block_on( receive()  ──or──  Timer::after(timeout) )│  │
//!  │  └──────────────────────────┬───────────────────────────┘  │
//!  │                             ▼                              │
//!  │        Message::from_frame ──▶ CommandEngine::handle        │
//!  │                             │                              │
//!  │              restart? ──────┴──▶ SystemPort::restart        │
//!  └────────────────────────────────────────────────────────────┘
//! ```
//!
//! A restart requested by a handler is carried out here, after the
//! feedback has been queued. Nothing is drained before the reset.

use core::time::Duration;

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::channel::Receiver;
use futures_lite::future;
use log::{info, warn};

use super::channels::InboundFrame;
use super::engine::{CommandContext, CommandEngine, Outcome};
use super::message::Message;
use crate::app::ports::SystemPort;

/// Parse one raw frame and dispatch it.
pub fn process_frame(
    engine: &mut CommandEngine,
    frame: InboundFrame,
    ctx: &mut CommandContext<'_>,
) -> Outcome {
    let message = Message::from_frame(&frame.bytes);
    engine.handle(frame.client_id, message, ctx)
}

/// Wait up to `timeout` for a frame and handle it.
///
/// Returns `None` on timeout. Performs any restart the command requested.
pub fn run_once<M: RawMutex, const N: usize>(
    engine: &mut CommandEngine,
    requests: &Receiver<'_, M, InboundFrame, N>,
    ctx: &mut CommandContext<'_>,
    system: &mut dyn SystemPort,
    timeout: Duration,
) -> Option<Outcome> {
    let frame = future::block_on(future::or(
        async { Some(requests.receive().await) },
        async {
            async_io_mini::Timer::after(timeout).await;
            None
        },
    ))?;

    let outcome = process_frame(engine, frame, ctx);
    if let Some(restart) = outcome.restart {
        warn!(
            "RPC: restart ({:?}) in {} ms",
            restart.reason,
            restart.delay.as_millis()
        );
        system.restart(restart);
    }
    Some(outcome)
}

/// Client task body. Never returns.
pub fn run<M: RawMutex, const N: usize>(
    mut engine: CommandEngine,
    requests: Receiver<'_, M, InboundFrame, N>,
    mut ctx: CommandContext<'_>,
    system: &mut dyn SystemPort,
    timeout: Duration,
) -> ! {
    info!("Client task started (timeout {} ms)", timeout.as_millis());
    loop {
        run_once(&mut engine, &requests, &mut ctx, system, timeout);
    }
}

// ── Tests ────────────────────────────────────────────────────
