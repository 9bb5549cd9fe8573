//! Transport port - Interface for the live bidirectional channel.
//!
//! A transport opens one authenticated link to the messaging backend. The
//! link has two halves:
//!
//! - an [`ActionSink`] the connection manager writes outbound actions to
//! - an event receiver yielding decoded inbound [`ChatEvent`]s
//!
//! The receiver ending means the backend closed the link.

use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::domain::chat::{ChatEvent, MessageKind};
use crate::domain::foundation::{AuthToken, ChatId};

/// Errors raised by a transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The backend could not be reached.
    #[error("backend unreachable: {0}")]
    Unreachable(String),

    /// The backend answered but the handshake did not complete.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// The backend refused the credential.
    #[error("connection rejected: {0}")]
    Rejected(String),

    /// The handshake did not finish in time.
    #[error("handshake timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// The link is closed; nothing more can be sent.
    #[error("link closed")]
    Closed,
}

/// Outbound action emitted over the live channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientAction {
    JoinChat {
        chat_id: ChatId,
    },
    SendMessage {
        chat_id: ChatId,
        content: String,
        kind: MessageKind,
    },
    Typing {
        chat_id: ChatId,
        is_typing: bool,
    },
    MarkRead {
        chat_id: ChatId,
    },
}

impl ClientAction {
    /// Wire event name.
    pub fn event_name(&self) -> &'static str {
        match self {
            ClientAction::JoinChat { .. } => "join_chat",
            ClientAction::SendMessage { .. } => "send_message",
            ClientAction::Typing { .. } => "typing",
            ClientAction::MarkRead { .. } => "mark_read",
        }
    }

    /// Wire payload. `join_chat` carries the bare chat id.
    pub fn payload(&self) -> Value {
        match self {
            ClientAction::JoinChat { chat_id } => json!(chat_id),
            ClientAction::SendMessage {
                chat_id,
                content,
                kind,
            } => json!({ "chatId": chat_id, "content": content, "type": kind }),
            ClientAction::Typing { chat_id, is_typing } => {
                json!({ "chatId": chat_id, "isTyping": is_typing })
            }
            ClientAction::MarkRead { chat_id } => json!({ "chatId": chat_id }),
        }
    }

    pub fn chat_id(&self) -> &ChatId {
        match self {
            ClientAction::JoinChat { chat_id }
            | ClientAction::SendMessage { chat_id, .. }
            | ClientAction::Typing { chat_id, .. }
            | ClientAction::MarkRead { chat_id } => chat_id,
        }
    }
}

/// Write half of an open link.
pub trait ActionSink: Send + Sync {
    /// Hands an action to the link. Does not wait for the backend.
    fn submit(&self, action: ClientAction) -> Result<(), TransportError>;

    /// Releases the link. Idempotent.
    fn close(&self);
}

/// An open, authenticated link.
pub struct TransportLink {
    pub sink: Box<dyn ActionSink>,
    pub events: mpsc::UnboundedReceiver<ChatEvent>,
}

impl TransportLink {
    pub fn new(sink: Box<dyn ActionSink>, events: mpsc::UnboundedReceiver<ChatEvent>) -> Self {
        Self { sink, events }
    }
}

impl std::fmt::Debug for TransportLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportLink").finish_non_exhaustive()
    }
}

/// Port for opening the live channel.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Opens and authenticates a link with the given credential.
    async fn open(&self, token: &AuthToken) -> Result<TransportLink, TransportError>;
}
