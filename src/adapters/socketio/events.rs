//! Mapping between Socket.IO event frames and chat events/actions.

use serde_json::Value;

use crate::domain::chat::{
    ChatEvent, ChatNotificationEvent, EventKind, MessagesReadEvent, NewMessageEvent,
    TransportErrorEvent, TypingEvent,
};
use crate::ports::ClientAction;

use super::packet::Packet;

/// Turns an inbound event into a [`ChatEvent`].
///
/// Returns `Ok(None)` for event names the client does not consume.
pub fn decode_event(name: &str, data: Value) -> Result<Option<ChatEvent>, serde_json::Error> {
    let kind = match EventKind::ALL
        .iter()
        .find(|kind| kind.wire_name() == Some(name))
    {
        Some(kind) => *kind,
        None => return Ok(None),
    };

    let event = match kind {
        EventKind::NewMessage => {
            ChatEvent::NewMessage(serde_json::from_value::<NewMessageEvent>(data)?)
        }
        EventKind::ChatNotification => {
            ChatEvent::ChatNotification(serde_json::from_value::<ChatNotificationEvent>(data)?)
        }
        EventKind::UserTyping => {
            ChatEvent::UserTyping(serde_json::from_value::<TypingEvent>(data)?)
        }
        EventKind::MessagesRead => {
            ChatEvent::MessagesRead(serde_json::from_value::<MessagesReadEvent>(data)?)
        }
        EventKind::TransportError => ChatEvent::TransportError(error_event(data)),
        EventKind::ConnectionChanged => return Ok(None),
    };
    Ok(Some(event))
}

// The backend sends `{message}`, but a bare string is accepted too
fn error_event(data: Value) -> TransportErrorEvent {
    match data {
        Value::String(message) => TransportErrorEvent { message },
        other => serde_json::from_value(other.clone()).unwrap_or(TransportErrorEvent {
            message: other.to_string(),
        }),
    }
}

/// Encodes an outbound action as an event packet.
pub fn encode_action(action: &ClientAction) -> Packet {
    Packet::event(action.event_name(), action.payload())
}
