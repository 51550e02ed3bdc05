//! Chat domain types
//!
//! Shapes mirror the messaging service's JSON wire format: camelCase
//! field names, `type` discriminators, RFC3339 timestamps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Conversation kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConversationType {
    /// Direct message between two members
    Dm,
    /// Group conversation
    Group,
}

/// Role a member holds within the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Parent,
    Eleve,
    Enseignant,
    Admin,
    Directeur,
}

/// A member of a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationMember {
    pub user_id: String,
    pub role: MemberRole,
    /// When this member last read the conversation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_read_at: Option<DateTime<Utc>>,
}

/// A conversation as reported by the messaging API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ConversationType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub members: Vec<ConversationMember>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub unread_count: u32,
}

/// Message content kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageType {
    Text,
    Image,
    File,
    System,
}

/// A file attached to a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: String,
    pub filename: String,
    pub url: String,
    /// MIME type as reported by the server
    #[serde(rename = "type")]
    pub kind: String,
}

/// A single chat message
///
/// Ids are server-assigned; the cache never generates them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    #[serde(rename = "type")]
    pub kind: MessageType,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Acknowledgement kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AckType {
    Delivered,
    Read,
}

/// Delivery/read acknowledgement for a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageAck {
    pub message_id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    pub kind: AckType,
    pub timestamp: DateTime<Utc>,
}

/// Presence state of a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Offline,
    Away,
}

impl PresenceStatus {
    /// Whether this status counts as reachable
    pub fn is_online(&self) -> bool {
        matches!(self, PresenceStatus::Online)
    }
}

/// Presence report for a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceUpdate {
    pub user_id: String,
    pub status: PresenceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_conversation_wire_format() {
        let json = r#"{
            "id": "conv-1",
            "type": "GROUP",
            "title": "CM2 - Parents",
            "members": [
                {"userId": "u-1", "role": "enseignant"},
                {"userId": "u-2", "role": "parent", "lastReadAt": "2026-03-01T10:00:00Z"}
            ],
            "lastMessageAt": "2026-03-01T10:05:00Z",
            "unreadCount": 3
        }"#;

        let conv: Conversation = serde_json::from_str(json).unwrap();
        assert_eq!(conv.id, "conv-1");
        assert_eq!(conv.kind, ConversationType::Group);
        assert_eq!(conv.title.as_deref(), Some("CM2 - Parents"));
        assert_eq!(conv.members.len(), 2);
        assert_eq!(conv.members[0].role, MemberRole::Enseignant);
        assert!(conv.members[0].last_read_at.is_none());
        assert_eq!(conv.unread_count, 3);
    }

    #[test]
    fn test_conversation_minimal() {
        // DMs often arrive without title, members list or counters
        let json = r#"{"id": "conv-2", "type": "DM"}"#;
        let conv: Conversation = serde_json::from_str(json).unwrap();

        assert_eq!(conv.kind, ConversationType::Dm);
        assert!(conv.title.is_none());
        assert!(conv.members.is_empty());
        assert_eq!(conv.unread_count, 0);
    }

    #[test]
    fn test_message_wire_format() {
        let json = r#"{
            "id": "msg-1",
            "conversationId": "conv-1",
            "senderId": "u-1",
            "type": "FILE",
            "content": "devoirs.pdf",
            "attachments": [
                {"id": "att-1", "filename": "devoirs.pdf", "url": "https://files/att-1", "type": "application/pdf"}
            ],
            "createdAt": "2026-03-01T10:05:00Z"
        }"#;

        let msg: ChatMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.kind, MessageType::File);
        assert_eq!(msg.attachments.len(), 1);
        assert_eq!(msg.attachments[0].kind, "application/pdf");
        assert!(msg.updated_at.is_none());
    }

    #[test]
    fn test_message_roundtrip_skips_empty_fields() {
        let msg = ChatMessage {
            id: "msg-9".to_string(),
            conversation_id: "conv-1".to_string(),
            sender_id: "u-3".to_string(),
            kind: MessageType::Text,
            content: "bonjour".to_string(),
            attachments: vec![],
            metadata: None,
            created_at: ts(100),
            updated_at: None,
            deleted_at: None,
        };

        let json = serde_json::to_value(&msg).unwrap();
        assert!(json.get("attachments").is_none());
        assert!(json.get("metadata").is_none());
        assert_eq!(json["type"], "TEXT");
        assert_eq!(json["conversationId"], "conv-1");

        let back: ChatMessage = serde_json::from_value(json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_ack_wire_format() {
        let json = r#"{"messageId": "msg-1", "userId": "u-2", "type": "READ", "timestamp": "2026-03-01T10:06:00Z"}"#;
        let ack: MessageAck = serde_json::from_str(json).unwrap();
        assert_eq!(ack.kind, AckType::Read);
    }

    #[test]
    fn test_presence_wire_format() {
        let json = r#"{"userId": "u-2", "status": "away", "lastSeenAt": "2026-03-01T09:00:00Z"}"#;
        let presence: PresenceUpdate = serde_json::from_str(json).unwrap();
        assert_eq!(presence.status, PresenceStatus::Away);
        assert!(!presence.status.is_online());
        assert!(presence.last_seen_at.is_some());
    }
}
