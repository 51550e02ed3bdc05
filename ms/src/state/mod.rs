//! Synchronized state - actor owning the chat cache
//!
//! All mutation and reads go through the [`StateManager`] handle, which
//! talks to a single actor task over channels. This keeps the cache
//! single-owner with no locking.

mod manager;
mod messages;

pub use manager::{StateEvent, StateManager, spawn_event_pump};
pub use messages::{StateCommand, StateError, StateResponse};
