//! SnapshotClient port - Request/response access to chat state.
//!
//! Used for initial load and as the fallback path while the live channel is
//! down. Calls are independent of connection state; failures are returned to
//! the caller, never retried here.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::chat::{Chat, ChatSummary, Message, MessageKind};
use crate::domain::foundation::{ChatId, ItemId, UserId};

/// Errors raised by snapshot calls.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    /// Non-success response (or the transport-level equivalent).
    #[error("request failed ({status}): {message}")]
    RequestFailed { status: u16, message: String },

    /// Success status but the body did not match the expected envelope.
    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl SnapshotError {
    pub fn request_failed(status: u16, message: impl Into<String>) -> Self {
        Self::RequestFailed {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(what: &str) -> Self {
        Self::request_failed(404, format!("{} not found", what))
    }

    pub fn unauthenticated() -> Self {
        Self::request_failed(401, "No token, authorization denied")
    }

    /// HTTP-equivalent status, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            SnapshotError::RequestFailed { status, .. } => Some(*status),
            SnapshotError::Decode(_) => None,
        }
    }
}

/// Arguments for starting (or resuming) a chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartChat {
    pub recipient_id: UserId,
    pub item: Option<ItemId>,
    pub initial_message: Option<String>,
}

impl StartChat {
    pub fn with(recipient_id: UserId) -> Self {
        Self {
            recipient_id,
            item: None,
            initial_message: None,
        }
    }

    pub fn about_item(mut self, item: ItemId) -> Self {
        self.item = Some(item);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.initial_message = Some(message.into());
        self
    }
}

/// Port for request/response chat access.
#[async_trait]
pub trait SnapshotClient: Send + Sync {
    /// Chat list for the current user, newest activity first.
    async fn list_chats(&self) -> Result<Vec<ChatSummary>, SnapshotError>;

    /// One chat with its full history.
    async fn get_chat(&self, chat_id: &ChatId) -> Result<Chat, SnapshotError>;

    /// Creates a chat (and its first message when one is given).
    async fn start_chat(&self, request: StartChat) -> Result<Chat, SnapshotError>;

    /// Posts one message and returns it with its assigned identity.
    async fn send_message(
        &self,
        chat_id: &ChatId,
        content: &str,
        kind: MessageKind,
    ) -> Result<Message, SnapshotError>;

    /// Substring search over one chat's message bodies.
    async fn search_messages(
        &self,
        chat_id: &ChatId,
        query: &str,
    ) -> Result<Vec<Message>, SnapshotError>;

    /// Total unread count across the current user's chats.
    async fn unread_count(&self) -> Result<u32, SnapshotError>;

    /// Sets a chat's status to archived.
    async fn archive_chat(&self, chat_id: &ChatId) -> Result<(), SnapshotError>;
}
