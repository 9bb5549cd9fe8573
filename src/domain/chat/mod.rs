//! Chat module - the messaging domain mirrored by the client.
//!
//! Chats and messages are created by the backend; the client holds copies,
//! ephemeral typing state, the connection state and the per-chat timelines
//! that reconcile snapshots with live events.

mod chat;
mod connection;
mod events;
mod message;
mod participant;
mod profile;
mod timeline;
mod typing;

pub use chat::{Chat, ChatStatus, ChatSummary, LastMessagePreview, MAX_SEARCH_RESULTS};
pub use connection::ConnectionState;
pub use events::{
    ChatEvent, ChatNotificationEvent, EventKind, MessagesReadEvent, NewMessageEvent,
    TransportErrorEvent, TypingEvent,
};
pub use message::{validate_content, Attachment, Message, MessageKind, MAX_MESSAGE_LENGTH};
pub use participant::{Participant, ParticipantRole};
pub use profile::{AccountType, ItemRef, UserProfile};
pub use timeline::{ChatTimeline, TimelineStatus};
pub use typing::TypingState;
