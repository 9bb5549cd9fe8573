//! Application layer - The chat client session.
//!
//! Coordinates the ports into the client-facing operations: connection
//! lifecycle, per-chat actions and the reconciled view.

mod client;
mod connection_manager;
mod errors;
mod reconciler;
mod room_session;

pub use client::ChatClient;
pub use connection_manager::ConnectionManager;
pub use errors::ChatError;
pub use reconciler::Reconciler;
pub use room_session::{RoomSession, SendOutcome};
