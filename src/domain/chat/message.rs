//! Message entity for chats.
//!
//! Messages are created by the backend and mirrored client-side. The
//! identity is the de-duplication key across snapshot and live delivery.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{MessageId, Timestamp, UserId, ValidationError};

use super::profile::UserProfile;

/// Maximum message body length accepted by the backend.
pub const MAX_MESSAGE_LENGTH: usize = 1000;

/// Kind of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Plain text.
    #[default]
    Text,
    /// Image (body carries the image reference).
    Image,
    /// Structured inquiry about an order or listing.
    OrderInquiry,
    /// Generated by the system, never by a participant.
    System,
}

impl MessageKind {
    /// Returns the wire name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Image => "image",
            MessageKind::OrderInquiry => "order_inquiry",
            MessageKind::System => "system",
        }
    }

    /// Returns true if a participant may author this kind.
    pub fn is_user_authored(&self) -> bool {
        !matches!(self, MessageKind::System)
    }
}

/// File attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
}

/// A message within a chat.
///
/// # Invariants
///
/// - `id` is globally unique and stable
/// - `created_at` never changes; edits only set `edited_at`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(rename = "_id")]
    pub id: MessageId,
    pub sender: UserProfile,
    pub content: String,
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
    #[serde(rename = "timestamp")]
    pub created_at: Timestamp,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl Message {
    /// Builds a freshly accepted message. Backends only.
    pub fn accepted(
        id: MessageId,
        sender: UserProfile,
        content: impl Into<String>,
        kind: MessageKind,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            sender,
            content: content.into(),
            kind,
            created_at,
            is_read: false,
            edited_at: None,
            attachments: Vec::new(),
        }
    }

    /// Returns the sender's user id.
    pub fn sender_id(&self) -> &UserId {
        &self.sender.id
    }

    /// Returns true if `user` authored this message.
    pub fn is_from(&self, user: &UserId) -> bool {
        &self.sender.id == user
    }

    /// Case-insensitive substring match over the body.
    pub fn matches(&self, query: &str) -> bool {
        self.content.to_lowercase().contains(&query.to_lowercase())
    }
}

/// Validates an outgoing message body before any I/O.
pub fn validate_content(content: &str) -> Result<(), ValidationError> {
    if content.trim().is_empty() {
        return Err(ValidationError::empty_field("content"));
    }
    let length = content.chars().count();
    if length > MAX_MESSAGE_LENGTH {
        return Err(ValidationError::too_long("content", MAX_MESSAGE_LENGTH, length));
    }
    Ok(())
}
