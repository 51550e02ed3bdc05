//! Core ChatCache implementation

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::debug;

use crate::model::{ChatMessage, Conversation, MessageAck, PresenceUpdate};

/// Aggregate counters over the cached state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheMetrics {
    /// Number of cached conversations
    pub conversations: usize,
    /// Number of cached messages across all conversations
    pub messages: usize,
    /// Sum of unread counters across conversations
    pub unread_total: u64,
    /// Users currently reported online
    pub online_users: usize,
}

/// In-memory cache of synchronized messaging state
///
/// Message lists are kept ordered by `created_at` (ties broken by id) and
/// de-duplicated by message id. Refetch results replace cached data
/// wholesale; transport events mutate it incrementally.
#[derive(Debug, Default)]
pub struct ChatCache {
    /// Conversations by id
    conversations: HashMap<String, Conversation>,
    /// Messages by conversation id, ordered by (created_at, id)
    messages: HashMap<String, Vec<ChatMessage>>,
    /// Acks by message id
    acks: HashMap<String, Vec<MessageAck>>,
    /// Users currently typing, by conversation id
    typing: HashMap<String, HashSet<String>>,
    /// Presence by user id
    presence: HashMap<String, PresenceUpdate>,
}

impl ChatCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    // === Conversations ===

    /// Replace the entire conversation list with refetched data
    ///
    /// The server's list is authoritative: cached messages and typing
    /// state for conversations absent from the new list are dropped.
    pub fn replace_conversations(&mut self, conversations: Vec<Conversation>) {
        debug!(count = conversations.len(), "replace_conversations");
        self.conversations = conversations.into_iter().map(|c| (c.id.clone(), c)).collect();
        let conversations = &self.conversations;
        self.messages.retain(|id, _| conversations.contains_key(id));
        self.typing.retain(|id, _| conversations.contains_key(id));
    }

    /// Insert or update a single conversation
    pub fn upsert_conversation(&mut self, conversation: Conversation) {
        debug!(id = %conversation.id, "upsert_conversation");
        self.conversations.insert(conversation.id.clone(), conversation);
    }

    /// Remove a conversation and all state attached to it
    pub fn remove_conversation(&mut self, id: &str) {
        debug!(%id, "remove_conversation");
        self.conversations.remove(id);
        self.messages.remove(id);
        self.typing.remove(id);
    }

    /// Get a conversation by id
    pub fn conversation(&self, id: &str) -> Option<&Conversation> {
        self.conversations.get(id)
    }

    /// All conversations, most recently active first
    pub fn conversations(&self) -> Vec<Conversation> {
        let mut list: Vec<Conversation> = self.conversations.values().cloned().collect();
        list.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at).then_with(|| a.id.cmp(&b.id)));
        list
    }

    // === Messages ===

    /// Replace one conversation's message list with refetched data
    ///
    /// Input order does not matter; the list is sorted and de-duplicated.
    pub fn replace_messages(&mut self, conversation_id: &str, messages: Vec<ChatMessage>) {
        debug!(%conversation_id, count = messages.len(), "replace_messages");
        let mut list = messages;
        list.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        list.dedup_by(|a, b| a.id == b.id);
        self.messages.insert(conversation_id.to_string(), list);
    }

    /// Insert a single incoming message, keeping order and uniqueness
    ///
    /// Returns false if a message with the same id is already cached.
    /// A newly inserted message bumps the conversation's `unread_count`
    /// and `last_message_at` when the conversation is known.
    pub fn insert_message(&mut self, message: ChatMessage) -> bool {
        let list = self.messages.entry(message.conversation_id.clone()).or_default();
        if list.iter().any(|m| m.id == message.id) {
            debug!(id = %message.id, "insert_message: duplicate, ignored");
            return false;
        }

        let pos = list.partition_point(|m| {
            (m.created_at, m.id.as_str()) <= (message.created_at, message.id.as_str())
        });
        list.insert(pos, message.clone());

        if let Some(conv) = self.conversations.get_mut(&message.conversation_id) {
            conv.unread_count = conv.unread_count.saturating_add(1);
            if conv.last_message_at.is_none_or(|t| t < message.created_at) {
                conv.last_message_at = Some(message.created_at);
            }
        }
        true
    }

    /// Messages for a conversation, oldest first (empty if unknown)
    pub fn messages(&self, conversation_id: &str) -> &[ChatMessage] {
        self.messages.get(conversation_id).map(Vec::as_slice).unwrap_or(&[])
    }

    // === Acks ===

    /// Record a delivery/read ack, replacing any previous ack of the same
    /// kind from the same user
    pub fn apply_ack(&mut self, ack: MessageAck) {
        let list = self.acks.entry(ack.message_id.clone()).or_default();
        list.retain(|a| !(a.user_id == ack.user_id && a.kind == ack.kind));
        list.push(ack);
    }

    /// Acks recorded for a message
    pub fn acks(&self, message_id: &str) -> &[MessageAck] {
        self.acks.get(message_id).map(Vec::as_slice).unwrap_or(&[])
    }

    // === Typing ===

    /// Set or clear a user's typing flag in a conversation
    pub fn set_typing(&mut self, conversation_id: &str, user_id: &str, is_typing: bool) {
        if is_typing {
            self.typing
                .entry(conversation_id.to_string())
                .or_default()
                .insert(user_id.to_string());
        } else if let Some(set) = self.typing.get_mut(conversation_id) {
            set.remove(user_id);
            if set.is_empty() {
                self.typing.remove(conversation_id);
            }
        }
    }

    /// Users currently typing in a conversation, sorted for determinism
    pub fn typing_users(&self, conversation_id: &str) -> Vec<String> {
        let mut users: Vec<String> = self
            .typing
            .get(conversation_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        users.sort();
        users
    }

    // === Presence ===

    /// Record a presence report
    pub fn set_presence(&mut self, update: PresenceUpdate) {
        self.presence.insert(update.user_id.clone(), update);
    }

    /// Last known presence for a user
    pub fn presence(&self, user_id: &str) -> Option<&PresenceUpdate> {
        self.presence.get(user_id)
    }

    // === Aggregates ===

    /// Sum of unread counters across all conversations
    pub fn unread_total(&self) -> u64 {
        self.conversations.values().map(|c| u64::from(c.unread_count)).sum()
    }

    /// Aggregate counters for display
    pub fn metrics(&self) -> CacheMetrics {
        CacheMetrics {
            conversations: self.conversations.len(),
            messages: self.messages.values().map(Vec::len).sum(),
            unread_total: self.unread_total(),
            online_users: self.presence.values().filter(|p| p.status.is_online()).count(),
        }
    }
}
