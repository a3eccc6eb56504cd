//! Immutable chat message values.

use crate::ids::{AgentId, MessageId, RoomId, SenderId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Chat,
    System,
    Action,
    Join,
    Leave,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub id: String,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: u64,
}

/// A persisted chat message. Construct only via [`ChatMessage::new`] so the
/// `type=join|leave ⇒ senderId=system` invariant cannot be violated by
/// hand-built structs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub room_id: RoomId,
    pub sender_id: SenderId,
    pub sender_name: String,
    pub content: String,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    pub timestamp_ms: i64,
    pub reply_to_id: Option<MessageId>,
    pub mentions: Vec<String>,
    pub attachments: Vec<Attachment>,
}

impl ChatMessage {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: MessageId,
        room_id: RoomId,
        sender_id: SenderId,
        sender_name: impl Into<String>,
        content: impl Into<String>,
        message_type: MessageType,
        timestamp_ms: i64,
        reply_to_id: Option<MessageId>,
        mentions: Vec<String>,
        attachments: Vec<Attachment>,
    ) -> Self {
        debug_assert!(
            !matches!(message_type, MessageType::Join | MessageType::Leave)
                || matches!(sender_id, SenderId::System),
            "join/leave messages must be authored by the system"
        );
        Self {
            id,
            room_id,
            sender_id,
            sender_name: sender_name.into(),
            content: content.into(),
            message_type,
            timestamp_ms,
            reply_to_id,
            mentions,
            attachments,
        }
    }

    pub fn system_line(
        id: MessageId,
        room_id: RoomId,
        content: impl Into<String>,
        message_type: MessageType,
        timestamp_ms: i64,
    ) -> Self {
        Self::new(
            id,
            room_id,
            SenderId::System,
            "system",
            content,
            message_type,
            timestamp_ms,
            None,
            Vec::new(),
            Vec::new(),
        )
    }

    /// Mentioned agent names extracted from `@name` tokens in `content`,
    /// used when the caller has not already computed `mentions` explicitly.
    pub fn extract_mentions(content: &str, known_agent_names: &[&str]) -> Vec<String> {
        let mut found = Vec::new();
        for token in content.split_whitespace() {
            let Some(name) = token.strip_prefix('@') else { continue };
            let trimmed = name.trim_end_matches(|c: char| !c.is_alphanumeric() && c != '_');
            if known_agent_names.iter().any(|n| *n == trimmed) && !found.iter().any(|f| f == trimmed) {
                found.push(trimmed.to_string());
            }
        }
        found
    }
}

/// Reference to a known agent id purely for formatting purposes (not stored).
pub type AgentRef = AgentId;
