//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the chat core to external systems:
//! - `events` - In-process event registry
//! - `socketio` - Live channel over Socket.IO/WebSocket
//! - `http` - REST snapshot client
//! - `memory` - In-memory chat backend for tests and local runs

pub mod events;
pub mod http;
pub mod memory;
pub mod socketio;

pub use events::{DispatchOutcome, EventRegistry, Subscription, SubscriptionId};
pub use http::{HttpSnapshotClient, HttpSnapshotConfig};
pub use memory::{InMemoryChatBackend, InMemorySnapshotClient, InMemoryTransport};
pub use socketio::SocketIoTransport;
