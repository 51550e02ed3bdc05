//! State manager messages
//!
//! Commands and responses for the actor pattern.

use thiserror::Error;
use tokio::sync::oneshot;

use crate::events::ChatEvent;
use msgcache::{CacheMetrics, ChatMessage, Conversation, PresenceUpdate};

/// Errors from state operations
#[derive(Debug, Error)]
pub enum StateError {
    #[error("State actor is not running")]
    ChannelError,
}

/// Response from state operations
pub type StateResponse<T> = Result<T, StateError>;

/// Commands sent to the StateManager actor
#[derive(Debug)]
pub enum StateCommand {
    /// Apply a transport event to the cache (fire-and-forget)
    ApplyEvent { event: ChatEvent },

    // Refetch results (authoritative replacements)
    ReplaceConversations {
        conversations: Vec<Conversation>,
        reply: oneshot::Sender<StateResponse<()>>,
    },
    ReplaceMessages {
        conversation_id: String,
        messages: Vec<ChatMessage>,
        reply: oneshot::Sender<StateResponse<()>>,
    },

    // Reads
    ListConversations {
        reply: oneshot::Sender<StateResponse<Vec<Conversation>>>,
    },
    GetConversation {
        id: String,
        reply: oneshot::Sender<StateResponse<Option<Conversation>>>,
    },
    ListMessages {
        conversation_id: String,
        reply: oneshot::Sender<StateResponse<Vec<ChatMessage>>>,
    },
    TypingUsers {
        conversation_id: String,
        reply: oneshot::Sender<StateResponse<Vec<String>>>,
    },
    GetPresence {
        user_id: String,
        reply: oneshot::Sender<StateResponse<Option<PresenceUpdate>>>,
    },
    Metrics {
        reply: oneshot::Sender<StateResponse<CacheMetrics>>,
    },

    // Shutdown
    Shutdown,
}
