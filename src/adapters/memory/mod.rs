//! In-memory chat backend.
//!
//! Implements both the `Transport` and `SnapshotClient` ports over one shared
//! state, reproducing the server's room and notification rules. Used by the
//! tests and for running the client without a backend.

mod backend;
mod snapshot;
mod transport;

pub use backend::InMemoryChatBackend;
pub use snapshot::InMemorySnapshotClient;
pub use transport::InMemoryTransport;
