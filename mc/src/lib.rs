//! MsgCache - chat domain model and in-memory cache
//!
//! Holds the synchronized view of a messaging account: the conversation
//! list, per-conversation message lists, delivery/read acks, typing flags
//! and user presence. The cache is a plain data structure - no I/O, no
//! async - so it can be owned by an actor task and exercised directly in
//! tests.
//!
//! # Model
//!
//! All types serialize with serde using the messaging API's wire format
//! (camelCase field names, `type` discriminators). Timestamps are
//! `chrono::DateTime<Utc>`.
//!
//! # Example
//!
//! ```ignore
//! use msgcache::ChatCache;
//!
//! let mut cache = ChatCache::new();
//! cache.replace_conversations(fetched);
//! cache.insert_message(incoming);
//! let unread = cache.unread_total();
//! ```

pub mod cache;
pub mod model;

pub use cache::{CacheMetrics, ChatCache};
pub use model::{
    AckType, Attachment, ChatMessage, Conversation, ConversationMember, ConversationType, MemberRole, MessageAck,
    MessageType, PresenceStatus, PresenceUpdate,
};
