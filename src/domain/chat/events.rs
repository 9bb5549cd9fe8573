//! Events delivered to local subscribers.
//!
//! One tagged enum covers every inbound transport event plus the
//! connection-state signal, so a single registry keyed by [`EventKind`] can
//! fan all of them out.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::{ChatId, UserId};

use super::connection::ConnectionState;
use super::message::Message;

/// Discriminant used to key subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    ConnectionChanged,
    NewMessage,
    ChatNotification,
    UserTyping,
    MessagesRead,
    TransportError,
}

impl EventKind {
    /// Every kind, in declaration order.
    pub const ALL: [EventKind; 6] = [
        EventKind::ConnectionChanged,
        EventKind::NewMessage,
        EventKind::ChatNotification,
        EventKind::UserTyping,
        EventKind::MessagesRead,
        EventKind::TransportError,
    ];

    /// Wire event name, where the kind has one.
    pub fn wire_name(&self) -> Option<&'static str> {
        match self {
            EventKind::ConnectionChanged => None,
            EventKind::NewMessage => Some("new_message"),
            EventKind::ChatNotification => Some("chat_notification"),
            EventKind::UserTyping => Some("user_typing"),
            EventKind::MessagesRead => Some("messages_read"),
            EventKind::TransportError => Some("error"),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.wire_name() {
            Some(name) => f.write_str(name),
            None => f.write_str("connection_changed"),
        }
    }
}

/// `new_message`: a message was accepted into a chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMessageEvent {
    pub chat_id: ChatId,
    pub message: Message,
}

/// `chat_notification`: sent to the other participant's personal channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatNotificationEvent {
    pub chat_id: ChatId,
    #[serde(default)]
    pub message: Option<Message>,
    /// Display name of the sender.
    #[serde(default)]
    pub sender: Option<String>,
}

/// `user_typing`: another participant started or stopped composing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingEvent {
    pub user_id: UserId,
    #[serde(default)]
    pub user_name: Option<String>,
    pub is_typing: bool,
    /// Older backends omit the chat; such events cannot be keyed.
    #[serde(default)]
    pub chat_id: Option<ChatId>,
}

/// `messages_read`: a participant acknowledged the chat as read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagesReadEvent {
    pub chat_id: ChatId,
    pub read_by: UserId,
}

/// `error`: the backend rejected an action sent over the live channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportErrorEvent {
    #[serde(default)]
    pub message: String,
}

/// Everything a subscriber can receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    ConnectionChanged(ConnectionState),
    NewMessage(NewMessageEvent),
    ChatNotification(ChatNotificationEvent),
    UserTyping(TypingEvent),
    MessagesRead(MessagesReadEvent),
    TransportError(TransportErrorEvent),
}

impl ChatEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ChatEvent::ConnectionChanged(_) => EventKind::ConnectionChanged,
            ChatEvent::NewMessage(_) => EventKind::NewMessage,
            ChatEvent::ChatNotification(_) => EventKind::ChatNotification,
            ChatEvent::UserTyping(_) => EventKind::UserTyping,
            ChatEvent::MessagesRead(_) => EventKind::MessagesRead,
            ChatEvent::TransportError(_) => EventKind::TransportError,
        }
    }

    /// The chat an event is scoped to, if any.
    pub fn chat_id(&self) -> Option<&ChatId> {
        match self {
            ChatEvent::NewMessage(e) => Some(&e.chat_id),
            ChatEvent::ChatNotification(e) => Some(&e.chat_id),
            ChatEvent::UserTyping(e) => e.chat_id.as_ref(),
            ChatEvent::MessagesRead(e) => Some(&e.chat_id),
            ChatEvent::ConnectionChanged(_) | ChatEvent::TransportError(_) => None,
        }
    }
}
