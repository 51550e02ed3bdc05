//! Event types for messaging activity
//!
//! These mirror the server's WebSocket envelope: a `type` discriminator
//! plus a camelCase `payload`. The same types serve as the in-process
//! event vocabulary, so the transport deserializes frames straight into
//! [`ChatEvent`] and emits them on the bus.

use chrono::{DateTime, Utc};
use msgcache::{ChatMessage, Conversation, PresenceStatus};
use serde::{Deserialize, Serialize};

/// What happened to a conversation in a `conversation_updated` event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationAction {
    Created,
    Updated,
    Deleted,
}

/// Core event enum - the vocabulary of messaging activity
///
/// Wire format: `{"type": "message_received", "payload": {...}}`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ChatEvent {
    /// A new message arrived in a conversation
    #[serde(rename_all = "camelCase")]
    MessageReceived {
        conversation_id: String,
        message: ChatMessage,
    },
    /// A user started typing
    #[serde(rename_all = "camelCase")]
    TypingStart {
        conversation_id: String,
        user_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        username: Option<String>,
    },
    /// A user stopped typing
    #[serde(rename_all = "camelCase")]
    TypingStop {
        conversation_id: String,
        user_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        username: Option<String>,
    },
    /// A user's presence changed
    #[serde(rename_all = "camelCase")]
    PresenceUpdate {
        user_id: String,
        status: PresenceStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        last_seen_at: Option<DateTime<Utc>>,
    },
    /// A conversation was created, updated or deleted
    #[serde(rename_all = "camelCase")]
    ConversationUpdated {
        conversation_id: String,
        action: ConversationAction,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        conversation: Option<Conversation>,
    },
}

impl ChatEvent {
    /// Event type tag, as it appears on the wire
    pub fn event_type(&self) -> &'static str {
        match self {
            ChatEvent::MessageReceived { .. } => "message_received",
            ChatEvent::TypingStart { .. } => "typing_start",
            ChatEvent::TypingStop { .. } => "typing_stop",
            ChatEvent::PresenceUpdate { .. } => "presence_update",
            ChatEvent::ConversationUpdated { .. } => "conversation_updated",
        }
    }

    /// Conversation this event concerns, when it has one
    pub fn conversation_id(&self) -> Option<&str> {
        match self {
            ChatEvent::MessageReceived { conversation_id, .. }
            | ChatEvent::TypingStart { conversation_id, .. }
            | ChatEvent::TypingStop { conversation_id, .. }
            | ChatEvent::ConversationUpdated { conversation_id, .. } => Some(conversation_id),
            ChatEvent::PresenceUpdate { .. } => None,
        }
    }
}

/// Client-to-server frames
///
/// The server infers the sender from the authenticated connection, so
/// outbound payloads carry no user id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientEvent {
    #[serde(rename_all = "camelCase")]
    TypingStart {
        conversation_id: String,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    TypingStop {
        conversation_id: String,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    PresenceUpdate {
        status: PresenceStatus,
        timestamp: DateTime<Utc>,
    },
}
