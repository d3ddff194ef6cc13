//! Transport-agnostic command protocol.
//!
//! Checksummed binary frames from the companion app are parsed, dispatched
//! to their handlers and answered with a feedback frame. Firmware images
//! arrive in-band through the same protocol.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                      RPC Stack                             │
//! │                                                            │
//! │  ┌───────────┐   ┌──────────┐   ┌───────────────────────┐  │
//! │  │ channels  │──▶│  codec   │──▶│  engine (dispatcher)  │  │
//! │  │ (queues)  │   │ (framing)│   │  → ConfigStore / ota  │  │
//! │  └───────────┘   └──────────┘   └───────────┬───────────┘  │
//! │       ▲                                     │              │
//! │       └──────── FeedbackMessage ────────────┘              │
//! └────────────────────────────────────────────────────────────┘
//! ```

pub mod channels;
pub mod checksum;
pub mod client_task;
pub mod codec;
pub mod engine;
pub mod message;
pub mod ota;
pub mod reader;
