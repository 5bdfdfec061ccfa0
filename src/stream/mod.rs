//! Live streaming subsystem.
//!
//! # Data Flow
//! ```text
//! record_request / push_sample
//!     → hub.rs (non-blocking signal to every subscriber mailbox)
//!
//! GET /api/metrics/stream
//!     → sse.rs subscribes, then waits on tick | signal | shutdown
//!     → Monitor::current_sample → `data: <json>` event
//!     → client disconnect drops the stream, which unsubscribes
//! ```
//!
//! # Design Decisions
//! - Signals carry no payload; consumers pull a fresh sample
//! - A full mailbox drops the signal for that subscriber only
//! - Subscriptions are RAII handles so no mailbox outlives its consumer

pub mod hub;
pub mod sse;

pub use hub::{Hub, SubscriberId, Subscription};
pub use sse::sample_events;
