//! RoomSession - Per-chat operations layered on the connection manager.
//!
//! Live-channel actions are preferred. Sending falls back to the snapshot
//! client when the channel is not open; joining, typing and read signals
//! have no fallback and report whether they were sent.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::adapters::events::{EventRegistry, Subscription};
use crate::domain::chat::{
    validate_content, ChatEvent, ConnectionState, EventKind, Message, MessageKind,
    MessagesReadEvent, NewMessageEvent,
};
use crate::domain::foundation::{ChatId, UserId};
use crate::ports::{ClientAction, SnapshotClient};

use super::connection_manager::ConnectionManager;
use super::errors::ChatError;

/// How a send was carried out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Handed to the live channel; the stored message arrives later as
    /// `new_message`.
    Dispatched,
    /// Stored through the request/response path and published locally.
    Persisted(Message),
}

#[derive(Default)]
struct RoomMemo {
    joined: HashSet<ChatId>,
    typing: HashMap<ChatId, bool>,
}

/// Join/send/typing/read operations for chats.
pub struct RoomSession {
    connection: ConnectionManager,
    snapshot: Arc<dyn SnapshotClient>,
    local_user: UserId,
    memo: Arc<Mutex<RoomMemo>>,
    _teardown: Subscription,
}

impl RoomSession {
    pub fn new(
        connection: ConnectionManager,
        snapshot: Arc<dyn SnapshotClient>,
        local_user: UserId,
    ) -> Self {
        let memo = Arc::new(Mutex::new(RoomMemo::default()));

        // Room membership and typing memos die with the link
        let teardown = {
            let memo = memo.clone();
            connection
                .registry()
                .on(EventKind::ConnectionChanged, "RoomSession", move |event| {
                    if let ChatEvent::ConnectionChanged(ConnectionState::Disconnected) = event {
                        let mut memo = memo.lock().unwrap_or_else(|e| e.into_inner());
                        memo.joined.clear();
                        memo.typing.clear();
                    }
                })
        };

        Self {
            connection,
            snapshot,
            local_user,
            memo,
            _teardown: teardown,
        }
    }

    fn memo(&self) -> MutexGuard<'_, RoomMemo> {
        self.memo.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn registry(&self) -> &EventRegistry {
        self.connection.registry()
    }

    /// Subscribes the live channel to a chat's room.
    ///
    /// Returns false when not connected; the caller retries after the next
    /// `Connected` transition.
    pub fn join(&self, chat_id: &ChatId) -> bool {
        match self.connection.emit(ClientAction::JoinChat {
            chat_id: chat_id.clone(),
        }) {
            Ok(()) => {
                self.memo().joined.insert(chat_id.clone());
                tracing::debug!(chat_id = %chat_id, "Joined chat room");
                true
            }
            Err(e) => {
                tracing::debug!(chat_id = %chat_id, error = %e, "Join skipped");
                false
            }
        }
    }

    pub fn is_joined(&self, chat_id: &ChatId) -> bool {
        self.memo().joined.contains(chat_id)
    }

    /// Sends a message.
    ///
    /// Content is validated before any I/O. With the live channel open the
    /// message is emitted and confirmed later by `new_message`. Otherwise it
    /// is posted through the snapshot client and the stored message is
    /// published locally as `new_message`.
    ///
    /// A live send that fails while being handed over is returned as a 503
    /// and not retried, since it may already have reached the backend.
    pub async fn send(
        &self,
        chat_id: &ChatId,
        content: &str,
        kind: MessageKind,
    ) -> Result<SendOutcome, ChatError> {
        validate_content(content)?;

        match self.connection.emit(ClientAction::SendMessage {
            chat_id: chat_id.clone(),
            content: content.to_string(),
            kind,
        }) {
            Ok(()) => return Ok(SendOutcome::Dispatched),
            Err(ChatError::NotConnected) => {}
            Err(e) => return Err(e),
        }

        tracing::debug!(chat_id = %chat_id, "Live channel down, sending via snapshot client");
        let message = self.snapshot.send_message(chat_id, content, kind).await?;
        self.registry().dispatch(&ChatEvent::NewMessage(NewMessageEvent {
            chat_id: chat_id.clone(),
            message: message.clone(),
        }));
        Ok(SendOutcome::Persisted(message))
    }

    /// Signals composing state. Only real transitions go on the wire.
    ///
    /// Returns true if a signal was sent.
    pub fn set_typing(&self, chat_id: &ChatId, is_typing: bool) -> bool {
        let mut memo = self.memo();
        let current = memo.typing.get(chat_id).copied().unwrap_or(false);
        if current == is_typing {
            return false;
        }

        let sent = self
            .connection
            .emit(ClientAction::Typing {
                chat_id: chat_id.clone(),
                is_typing,
            })
            .is_ok();
        if sent {
            if is_typing {
                memo.typing.insert(chat_id.clone(), true);
            } else {
                memo.typing.remove(chat_id);
            }
        }
        sent
    }

    /// Marks the chat's visible messages read.
    ///
    /// Once the live channel accepts the signal, a `messages_read` for the
    /// local participant is published so local unread state resets to zero.
    /// Returns false when not connected.
    pub fn mark_read(&self, chat_id: &ChatId) -> bool {
        match self.connection.emit(ClientAction::MarkRead {
            chat_id: chat_id.clone(),
        }) {
            Ok(()) => {
                self.registry().dispatch(&ChatEvent::MessagesRead(MessagesReadEvent {
                    chat_id: chat_id.clone(),
                    read_by: self.local_user.clone(),
                }));
                true
            }
            Err(e) => {
                tracing::debug!(chat_id = %chat_id, error = %e, "Read signal skipped");
                false
            }
        }
    }
}
