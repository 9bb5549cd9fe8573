//! Socket.IO v4 text framing over an Engine.IO v4 WebSocket.
//!
//! Each WebSocket text frame carries one packet. The first character is the
//! Engine.IO type; `4` (message) frames carry a Socket.IO packet whose type
//! is the second character:
//!
//! | Frame            | Meaning                          |
//! |------------------|----------------------------------|
//! | `0{...}`         | Engine.IO open (handshake)       |
//! | `1`              | Engine.IO close                  |
//! | `2` / `3`        | ping / pong                      |
//! | `40{...}`        | namespace connect (+ auth)       |
//! | `41`             | namespace disconnect             |
//! | `42["name",{}]`  | event                            |
//! | `44{...}`        | namespace connect error          |
//! | `6`              | noop                             |

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// Engine.IO open payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    /// Milliseconds between server pings.
    pub ping_interval: u64,
    /// Milliseconds the server waits for a pong.
    pub ping_timeout: u64,
    #[serde(default)]
    pub max_payload: Option<u64>,
}

impl Handshake {
    /// How long the link may stay silent before it is considered dead.
    pub fn heartbeat_deadline(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.ping_interval + self.ping_timeout)
    }
}

/// One decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Open(Handshake),
    Close,
    Ping,
    Pong,
    Noop,
    Connect(Option<Value>),
    Disconnect,
    Event { name: String, data: Value },
    ConnectError(Value),
}

impl Packet {
    pub fn event(name: impl Into<String>, data: Value) -> Self {
        Packet::Event {
            name: name.into(),
            data,
        }
    }

    /// Message carried by a connect error, if the server sent one.
    pub fn connect_error_message(payload: &Value) -> String {
        payload
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| payload.to_string())
    }
}

/// A frame that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PacketError {
    #[error("empty frame")]
    Empty,

    #[error("unsupported packet type '{0}'")]
    Unsupported(String),

    #[error("malformed packet: {0}")]
    Malformed(String),
}

/// Encodes a packet into its text frame.
pub fn encode(packet: &Packet) -> String {
    match packet {
        Packet::Open(handshake) => format!(
            "0{{\"sid\":{},\"pingInterval\":{},\"pingTimeout\":{}}}",
            Value::String(handshake.sid.clone()),
            handshake.ping_interval,
            handshake.ping_timeout
        ),
        Packet::Close => "1".to_string(),
        Packet::Ping => "2".to_string(),
        Packet::Pong => "3".to_string(),
        Packet::Noop => "6".to_string(),
        Packet::Connect(None) => "40".to_string(),
        Packet::Connect(Some(auth)) => format!("40{}", auth),
        Packet::Disconnect => "41".to_string(),
        Packet::Event { name, data } => {
            format!("42{}", Value::Array(vec![Value::String(name.clone()), data.clone()]))
        }
        Packet::ConnectError(payload) => format!("44{}", payload),
    }
}

/// Decodes one text frame.
pub fn decode(frame: &str) -> Result<Packet, PacketError> {
    let mut chars = frame.chars();
    let engine_type = chars.next().ok_or(PacketError::Empty)?;
    let rest = chars.as_str();

    match engine_type {
        '0' => serde_json::from_str(rest)
            .map(Packet::Open)
            .map_err(|e| PacketError::Malformed(format!("open payload: {}", e))),
        '1' => Ok(Packet::Close),
        '2' => Ok(Packet::Ping),
        '3' => Ok(Packet::Pong),
        '6' => Ok(Packet::Noop),
        '4' => decode_socket(rest),
        other => Err(PacketError::Unsupported(other.to_string())),
    }
}

fn decode_socket(frame: &str) -> Result<Packet, PacketError> {
    let mut chars = frame.chars();
    let socket_type = chars
        .next()
        .ok_or_else(|| PacketError::Malformed("missing socket packet type".to_string()))?;
    let body = skip_ack_id(skip_namespace(chars.as_str()));

    match socket_type {
        '0' => {
            if body.is_empty() {
                Ok(Packet::Connect(None))
            } else {
                parse_json(body).map(|v| Packet::Connect(Some(v)))
            }
        }
        '1' => Ok(Packet::Disconnect),
        '2' => decode_event(body),
        '4' => parse_json(body).map(Packet::ConnectError),
        other => Err(PacketError::Unsupported(format!("4{}", other))),
    }
}

fn decode_event(body: &str) -> Result<Packet, PacketError> {
    let value = parse_json(body)?;
    let mut items = match value {
        Value::Array(items) => items.into_iter(),
        _ => return Err(PacketError::Malformed("event is not an array".to_string())),
    };
    let name = match items.next() {
        Some(Value::String(name)) => name,
        _ => return Err(PacketError::Malformed("event name missing".to_string())),
    };
    let data = items.next().unwrap_or(Value::Null);
    Ok(Packet::Event { name, data })
}

// Non-default namespaces are prefixed `/name,`
fn skip_namespace(body: &str) -> &str {
    if body.starts_with('/') {
        match body.find(',') {
            Some(idx) => &body[idx + 1..],
            None => "",
        }
    } else {
        body
    }
}

fn skip_ack_id(body: &str) -> &str {
    body.trim_start_matches(|c: char| c.is_ascii_digit())
}

fn parse_json(body: &str) -> Result<Value, PacketError> {
    serde_json::from_str(body).map_err(|e| PacketError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_open_handshake() {
        let frame = r#"0{"sid":"abc","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#;
        match decode(frame).unwrap() {
            Packet::Open(handshake) => {
                assert_eq!(handshake.sid, "abc");
                assert_eq!(handshake.heartbeat_deadline().as_millis(), 45_000);
                assert_eq!(handshake.max_payload, Some(1_000_000));
            }
            other => panic!("expected open, got {:?}", other),
        }
    }

    #[test]
    fn decodes_heartbeat_frames() {
        assert_eq!(decode("2").unwrap(), Packet::Ping);
        assert_eq!(decode("3").unwrap(), Packet::Pong);
        assert_eq!(decode("6").unwrap(), Packet::Noop);
        assert_eq!(decode("1").unwrap(), Packet::Close);
    }

    #[test]
    fn decodes_connect_ack_with_and_without_payload() {
        assert_eq!(decode("40").unwrap(), Packet::Connect(None));
        assert_eq!(
            decode(r#"40{"sid":"xyz"}"#).unwrap(),
            Packet::Connect(Some(json!({ "sid": "xyz" })))
        );
    }

    #[test]
    fn decodes_event_with_payload() {
        let packet = decode(r#"42["new_message",{"chatId":"c-1"}]"#).unwrap();
        assert_eq!(packet, Packet::event("new_message", json!({ "chatId": "c-1" })));
    }

    #[test]
    fn decodes_event_with_namespace_and_ack_id() {
        let packet = decode(r#"42/chat,17["user_typing",{"isTyping":true}]"#).unwrap();
        assert_eq!(packet, Packet::event("user_typing", json!({ "isTyping": true })));
    }

    #[test]
    fn event_without_data_carries_null() {
        assert_eq!(decode(r#"42["ping"]"#).unwrap(), Packet::event("ping", Value::Null));
    }

    #[test]
    fn decodes_connect_error_message() {
        let packet = decode(r#"44{"message":"Authentication error"}"#).unwrap();
        match packet {
            Packet::ConnectError(payload) => {
                assert_eq!(Packet::connect_error_message(&payload), "Authentication error");
            }
            other => panic!("expected connect error, got {:?}", other),
        }
    }

    #[test]
    fn rejects_malformed_frames() {
        assert_eq!(decode(""), Err(PacketError::Empty));
        assert!(matches!(decode("9"), Err(PacketError::Unsupported(_))));
        assert!(matches!(decode("42{\"not\":\"array\"}"), Err(PacketError::Malformed(_))));
        assert!(matches!(decode("42[1,2]"), Err(PacketError::Malformed(_))));
    }

    #[test]
    fn encodes_client_frames() {
        assert_eq!(encode(&Packet::Pong), "3");
        assert_eq!(encode(&Packet::Disconnect), "41");
        assert_eq!(
            encode(&Packet::Connect(Some(json!({ "token": "t" })))),
            r#"40{"token":"t"}"#
        );
        assert_eq!(
            encode(&Packet::event("join_chat", json!("c-1"))),
            r#"42["join_chat","c-1"]"#
        );
    }

    #[test]
    fn encoded_event_decodes_back() {
        let packet = Packet::event("mark_read", json!({ "chatId": "c-9" }));
        assert_eq!(decode(&encode(&packet)).unwrap(), packet);
    }
}
