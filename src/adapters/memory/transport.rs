//! Transport whose links are sockets on the in-memory backend.
//!
//! Submitted actions are applied synchronously, so every event they cause is
//! already queued on the receiving links when `submit` returns.

use async_trait::async_trait;

use crate::domain::foundation::AuthToken;
use crate::ports::{ActionSink, ClientAction, Transport, TransportError, TransportLink};

use super::backend::{InMemoryChatBackend, OpenRefusal, SocketId};

#[derive(Clone)]
pub struct InMemoryTransport {
    backend: InMemoryChatBackend,
}

impl InMemoryTransport {
    pub fn new(backend: InMemoryChatBackend) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn open(&self, token: &AuthToken) -> Result<TransportLink, TransportError> {
        let (socket, events) = self.backend.open_socket(token.expose()).map_err(|e| match e {
            OpenRefusal::Unreachable => TransportError::Unreachable("connection refused".into()),
            OpenRefusal::Unauthenticated => TransportError::Rejected("Authentication failed".into()),
        })?;

        let sink = InMemorySink {
            backend: self.backend.clone(),
            socket,
        };
        Ok(TransportLink::new(Box::new(sink), events))
    }
}

struct InMemorySink {
    backend: InMemoryChatBackend,
    socket: SocketId,
}

impl ActionSink for InMemorySink {
    fn submit(&self, action: ClientAction) -> Result<(), TransportError> {
        if self.backend.submit(self.socket, action) {
            Ok(())
        } else {
            Err(TransportError::Closed)
        }
    }

    fn close(&self) {
        self.backend.close_socket(self.socket);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::chat::UserProfile;
    use crate::domain::foundation::{ChatId, UserId};

    fn backend() -> InMemoryChatBackend {
        let backend = InMemoryChatBackend::new();
        backend.register_user(
            UserProfile::named(UserId::new("alice").unwrap(), "Alice"),
            "a-token",
        );
        backend
    }

    #[tokio::test]
    async fn open_with_valid_token_creates_socket() {
        let backend = backend();
        let transport = backend.transport();

        let link = transport.open(&AuthToken::new("a-token").unwrap()).await;

        assert!(link.is_ok());
        assert_eq!(backend.connection_count(), 1);
    }

    #[tokio::test]
    async fn open_with_unknown_token_is_rejected() {
        let transport = backend().transport();

        let result = transport.open(&AuthToken::new("forged").unwrap()).await;

        assert!(matches!(result, Err(TransportError::Rejected(_))));
    }

    #[tokio::test]
    async fn open_while_refusing_is_unreachable() {
        let backend = backend();
        backend.set_refuse_connections(true);

        let result = backend
            .transport()
            .open(&AuthToken::new("a-token").unwrap())
            .await;

        assert!(matches!(result, Err(TransportError::Unreachable(_))));
    }

    #[tokio::test]
    async fn closing_sink_ends_event_stream() {
        let backend = backend();
        let mut link = backend
            .transport()
            .open(&AuthToken::new("a-token").unwrap())
            .await
            .unwrap();

        link.sink.close();

        assert!(link.events.recv().await.is_none());
        assert_eq!(
            link.sink.submit(ClientAction::JoinChat {
                chat_id: ChatId::new("c").unwrap()
            }),
            Err(TransportError::Closed)
        );
    }
}
