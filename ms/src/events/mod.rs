//! Event vocabulary and pub/sub plumbing
//!
//! The transport parses server frames into [`ChatEvent`]s and emits them
//! on the [`EventBus`]; consumers subscribe independently.
//!
//! # Architecture
//!
//! ```text
//!   WebSocket frames
//!         │ parse
//!         ▼
//! ┌─────────────────────────────────────────┐
//! │               EVENT BUS                  │
//! │     (tokio::sync::broadcast channel)     │
//! └─────────────────────────────────────────┘
//!         ↓                    ↓
//!   state pump            display loop
//!   (applies events       (prints activity
//!    to the cache)         for the CLI)
//! ```
//!
//! Emission is fire-and-forget: a bus with no subscribers drops events,
//! and a lagging subscriber loses the oldest ones. Both are safe here -
//! cached state is reconciled by the next refetch.

mod bus;
mod types;

pub use bus::{DEFAULT_CHANNEL_CAPACITY, EventBus, create_event_bus};
pub use types::{ChatEvent, ClientEvent, ConversationAction};
