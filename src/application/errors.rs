//! Errors surfaced to callers of the chat client.

use thiserror::Error;

use crate::domain::foundation::ValidationError;
use crate::ports::{SnapshotError, TransportError};

/// Error returned by chat client operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    /// A request/response call failed, or a live send could not be handed
    /// to the transport.
    #[error(transparent)]
    Request(#[from] SnapshotError),

    /// The operation needs the live channel and it is not open.
    #[error("not connected")]
    NotConnected,

    /// Rejected before any I/O.
    #[error("invalid message: {0}")]
    InvalidMessage(#[from] ValidationError),

    /// The transport could not be set up.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// No credential was supplied and none is stored.
    #[error("no auth token available")]
    MissingCredential,

    /// The client could not be assembled from configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ChatError {
    /// HTTP-equivalent status of a failed request.
    pub fn status(&self) -> Option<u16> {
        match self {
            ChatError::Request(e) => e.status(),
            _ => None,
        }
    }

    /// The live channel accepted no part of a send that was in flight.
    pub(crate) fn connection_lost(cause: &TransportError) -> Self {
        ChatError::Request(SnapshotError::request_failed(
            503,
            format!("connection lost before the message was sent: {}", cause),
        ))
    }
}
