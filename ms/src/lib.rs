//! MsgSync - realtime messaging synchronization engine
//!
//! MsgSync keeps a local cache of a messaging account (conversation list
//! plus per-conversation messages) fresh against the platform's messaging
//! service, combining push delivery with a polling fallback:
//!
//! - **Push when possible**: a WebSocket transport streams incremental
//!   events (messages, typing, presence, conversation changes) and
//!   reconnects with exponential backoff.
//! - **Poll when not**: while the transport is down, a coordinator
//!   refetches the conversation list and the active conversation's
//!   messages over REST on a fixed timer, and forces one immediate
//!   refetch the moment the transport comes back.
//! - **Never both**: the coordinator watches the transport's status and
//!   keeps at most one timer alive.
//!
//! # Modules
//!
//! - [`transport`] - WebSocket client and connection status signal
//! - [`events`] - event vocabulary and broadcast bus
//! - [`state`] - actor owning the chat cache
//! - [`fetch`] - REST client used for refetching
//! - [`sync`] - refetch seam and the polling coordinator
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface

pub mod cli;
pub mod config;
pub mod events;
pub mod fetch;
pub mod state;
pub mod sync;
pub mod transport;

// Re-export commonly used types
pub use config::{ApiConfig, Config, RealtimeConfig, SyncConfig};
pub use events::{ChatEvent, ClientEvent, ConversationAction, EventBus, create_event_bus};
pub use fetch::{FetchError, MessageApiClient};
pub use state::{StateError, StateEvent, StateManager, spawn_event_pump};
pub use sync::{ApiSyncHandler, SyncCoordinator, SyncError, SyncHandler, SyncSnapshot};
pub use transport::{ConnectionStatus, TransportError, WsTransport, WsTransportConfig};

// Domain model re-exports
pub use msgcache::{CacheMetrics, ChatCache, ChatMessage, Conversation, MessageAck, PresenceStatus, PresenceUpdate};
