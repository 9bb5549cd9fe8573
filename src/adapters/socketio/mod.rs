//! Socket.IO adapter - the live channel to the messaging backend.
//!
//! - `packet` - Engine.IO / Socket.IO v4 text framing
//! - `events` - Event frames to and from chat events and actions
//! - `transport` - WebSocket transport implementing the `Transport` port

mod events;
mod packet;
mod transport;

pub use events::{decode_event, encode_action};
pub use packet::{decode, encode, Handshake, Packet, PacketError};
pub use transport::SocketIoTransport;
