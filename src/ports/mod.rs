//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the chat core and the outside world. Adapters implement these ports.
//!
//! - `Transport` - Opens the live bidirectional channel
//! - `SnapshotClient` - Request/response access to chat state
//! - `EventHandler` - Local subscriber of chat events

mod event_handler;
mod snapshot_client;
mod transport;

pub use event_handler::{DispatchError, EventHandler, FnHandler};
pub use snapshot_client::{SnapshotClient, SnapshotError, StartChat};
pub use transport::{ActionSink, ClientAction, Transport, TransportError, TransportLink};
