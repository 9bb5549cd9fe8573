//! Shared state of the in-memory chat backend.
//!
//! Reproduces the marketplace server's messaging rules:
//!
//! - every socket is addressable through its user's personal room
//! - `join_chat` adds the socket to the chat room if the user participates
//! - `send_message` stores the message, broadcasts `new_message` to the chat
//!   room (sender included) and `chat_notification` to the other
//!   participants' personal rooms
//! - `typing` and `mark_read` reach the chat room except the sending socket
//! - unknown chats answer the sending socket with `error`

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;

use crate::domain::chat::{
    validate_content, Chat, ChatEvent, ChatNotificationEvent, Message, MessageKind,
    MessagesReadEvent, NewMessageEvent, TransportErrorEvent, TypingEvent, UserProfile,
};
use crate::domain::foundation::{ChatId, CredentialStore, MessageId, Timestamp, UserId};
use crate::ports::ClientAction;

use super::snapshot::InMemorySnapshotClient;
use super::transport::InMemoryTransport;

pub(super) type SocketId = u64;

pub(super) struct Socket {
    pub user: UserId,
    pub rooms: HashSet<ChatId>,
    pub events: mpsc::UnboundedSender<ChatEvent>,
}

#[derive(Default)]
pub(super) struct BackendState {
    pub users: HashMap<UserId, UserProfile>,
    pub tokens: HashMap<String, UserId>,
    pub chats: Vec<Chat>,
    pub sockets: HashMap<SocketId, Socket>,
    pub next_socket: SocketId,
    pub refuse_connections: bool,
    pub actions: Vec<(UserId, ClientAction)>,
}

impl BackendState {
    pub fn user_for_token(&self, token: &str) -> Option<&UserProfile> {
        self.tokens.get(token).and_then(|id| self.users.get(id))
    }

    pub fn chat_for(&self, chat_id: &ChatId, user: &UserId) -> Option<&Chat> {
        self.chats
            .iter()
            .find(|c| &c.id == chat_id && c.is_participant(user))
    }

    pub fn chat_for_mut(&mut self, chat_id: &ChatId, user: &UserId) -> Option<&mut Chat> {
        self.chats
            .iter_mut()
            .find(|c| &c.id == chat_id && c.is_participant(user))
    }

    fn emit_to_socket(&self, socket_id: SocketId, event: ChatEvent) {
        if let Some(socket) = self.sockets.get(&socket_id) {
            let _ = socket.events.send(event);
        }
    }

    fn emit_to_room(&self, chat_id: &ChatId, except: Option<SocketId>, event: &ChatEvent) {
        for (id, socket) in &self.sockets {
            if Some(*id) != except && socket.rooms.contains(chat_id) {
                let _ = socket.events.send(event.clone());
            }
        }
    }

    fn emit_to_user(&self, user: &UserId, event: &ChatEvent) {
        for socket in self.sockets.values().filter(|s| &s.user == user) {
            let _ = socket.events.send(event.clone());
        }
    }

    /// Applies one action submitted by a socket.
    pub fn apply(&mut self, socket_id: SocketId, action: ClientAction) {
        let user = match self.sockets.get(&socket_id) {
            Some(socket) => socket.user.clone(),
            None => return,
        };
        self.actions.push((user.clone(), action.clone()));

        match action {
            ClientAction::JoinChat { chat_id } => {
                if self.chat_for(&chat_id, &user).is_some() {
                    if let Some(socket) = self.sockets.get_mut(&socket_id) {
                        socket.rooms.insert(chat_id);
                    }
                }
            }
            ClientAction::SendMessage {
                chat_id,
                content,
                kind,
            } => self.accept_message(socket_id, &user, chat_id, content, kind),
            ClientAction::Typing { chat_id, is_typing } => {
                let event = ChatEvent::UserTyping(TypingEvent {
                    user_id: user.clone(),
                    user_name: self.users.get(&user).and_then(|u| u.name.clone()),
                    is_typing,
                    chat_id: Some(chat_id.clone()),
                });
                self.emit_to_room(&chat_id, Some(socket_id), &event);
            }
            ClientAction::MarkRead { chat_id } => {
                if let Some(chat) = self.chat_for_mut(&chat_id, &user) {
                    chat.mark_read_by(&user, Timestamp::now());
                    let event = ChatEvent::MessagesRead(MessagesReadEvent {
                        chat_id: chat_id.clone(),
                        read_by: user,
                    });
                    self.emit_to_room(&chat_id, Some(socket_id), &event);
                }
            }
        }
    }

    fn accept_message(
        &mut self,
        socket_id: SocketId,
        user: &UserId,
        chat_id: ChatId,
        content: String,
        kind: MessageKind,
    ) {
        if validate_content(&content).is_err() {
            self.emit_to_socket(socket_id, error_event("Failed to send message"));
            return;
        }
        let sender = match self.users.get(user) {
            Some(profile) => profile.clone(),
            None => return,
        };
        let message = Message::accepted(
            MessageId::generate(),
            sender.clone(),
            content,
            kind,
            Timestamp::now(),
        );

        let recipients: Vec<UserId> = match self.chat_for_mut(&chat_id, user) {
            Some(chat) => {
                chat.add_message(message.clone());
                chat.participants
                    .iter()
                    .map(|p| p.user_id().clone())
                    .filter(|id| id != user)
                    .collect()
            }
            None => {
                self.emit_to_socket(socket_id, error_event("Chat not found"));
                return;
            }
        };

        self.emit_to_room(
            &chat_id,
            None,
            &ChatEvent::NewMessage(NewMessageEvent {
                chat_id: chat_id.clone(),
                message: message.clone(),
            }),
        );

        let notification = ChatEvent::ChatNotification(ChatNotificationEvent {
            chat_id,
            message: Some(message),
            sender: sender.name,
        });
        for recipient in &recipients {
            self.emit_to_user(recipient, &notification);
        }
    }
}

fn error_event(message: &str) -> ChatEvent {
    ChatEvent::TransportError(TransportErrorEvent {
        message: message.to_string(),
    })
}

/// In-memory messaging backend.
///
/// Hands out a [`Transport`](crate::ports::Transport) and per-user
/// [`SnapshotClient`](crate::ports::SnapshotClient)s that share one state,
/// so several client sessions can talk to each other in one process.
///
/// # Example
///
/// ```ignore
/// let backend = InMemoryChatBackend::new();
/// backend.register_user(UserProfile::named(alice_id, "Alice"), "alice-token");
///
/// let transport = backend.transport();
/// let snapshot = backend.snapshot_client(credentials.clone());
/// ```
#[derive(Clone, Default)]
pub struct InMemoryChatBackend {
    state: Arc<Mutex<BackendState>>,
}

impl InMemoryChatBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub(super) fn lock(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Registers a user and the token that authenticates them.
    pub fn register_user(&self, profile: UserProfile, token: impl Into<String>) {
        let mut state = self.lock();
        state.tokens.insert(token.into(), profile.id.clone());
        state.users.insert(profile.id.clone(), profile);
    }

    /// Transport whose links are sockets on this backend.
    pub fn transport(&self) -> InMemoryTransport {
        InMemoryTransport::new(self.clone())
    }

    /// Snapshot client acting as whoever the store's token belongs to.
    pub fn snapshot_client(&self, credentials: Arc<CredentialStore>) -> InMemorySnapshotClient {
        InMemorySnapshotClient::new(self.clone(), credentials)
    }

    /// Makes subsequent `open` calls fail as if the server were down.
    pub fn set_refuse_connections(&self, refuse: bool) {
        self.lock().refuse_connections = refuse;
    }

    /// Closes every open socket from the server side.
    pub fn drop_connections(&self) {
        self.lock().sockets.clear();
    }

    /// Number of open sockets.
    pub fn connection_count(&self) -> usize {
        self.lock().sockets.len()
    }

    /// Every action received over the live channel, in order.
    pub fn received_actions(&self) -> Vec<(UserId, ClientAction)> {
        self.lock().actions.clone()
    }

    /// Current server-side copy of a chat.
    pub fn chat(&self, chat_id: &ChatId) -> Option<Chat> {
        self.lock().chats.iter().find(|c| &c.id == chat_id).cloned()
    }

    /// Pushes an arbitrary event to every socket of a user.
    pub fn push_to_user(&self, user: &UserId, event: ChatEvent) {
        self.lock().emit_to_user(user, &event);
    }

    pub(super) fn open_socket(
        &self,
        token: &str,
    ) -> Result<(SocketId, mpsc::UnboundedReceiver<ChatEvent>), OpenRefusal> {
        let mut state = self.lock();
        if state.refuse_connections {
            return Err(OpenRefusal::Unreachable);
        }
        let user = state
            .user_for_token(token)
            .map(|u| u.id.clone())
            .ok_or(OpenRefusal::Unauthenticated)?;

        let id = state.next_socket;
        state.next_socket += 1;
        let (tx, rx) = mpsc::unbounded_channel();
        state.sockets.insert(
            id,
            Socket {
                user,
                rooms: HashSet::new(),
                events: tx,
            },
        );
        Ok((id, rx))
    }

    pub(super) fn close_socket(&self, socket_id: SocketId) {
        self.lock().sockets.remove(&socket_id);
    }

    /// Returns false when the socket no longer exists.
    pub(super) fn submit(&self, socket_id: SocketId, action: ClientAction) -> bool {
        let mut state = self.lock();
        if !state.sockets.contains_key(&socket_id) {
            return false;
        }
        state.apply(socket_id, action);
        true
    }
}

pub(super) enum OpenRefusal {
    Unreachable,
    Unauthenticated,
}
