//! ChatClient - The explicit per-session entry point of the chat core.
//!
//! Wires one registry, one connection manager, one room session and one
//! reconciler together. Built once at startup and passed to whoever needs it.

use std::sync::Arc;

use crate::adapters::events::{EventRegistry, Subscription};
use crate::adapters::http::{HttpSnapshotClient, HttpSnapshotConfig};
use crate::adapters::socketio::SocketIoTransport;
use crate::config::AppConfig;
use crate::domain::chat::{ChatSummary, ConnectionState, Message, MessageKind};
use crate::domain::foundation::{AuthToken, ChatId, CredentialStore, UserId};
use crate::ports::{EventHandler, SnapshotClient, StartChat, Transport};

use super::connection_manager::ConnectionManager;
use super::errors::ChatError;
use super::reconciler::Reconciler;
use super::room_session::{RoomSession, SendOutcome};

/// A chat client session for one local user.
pub struct ChatClient {
    connection: ConnectionManager,
    rooms: RoomSession,
    snapshot: Arc<dyn SnapshotClient>,
    reconciler: Arc<Reconciler>,
    _reconciler_subscriptions: Vec<Subscription>,
}

impl ChatClient {
    pub fn new(
        local_user: UserId,
        transport: Arc<dyn Transport>,
        snapshot: Arc<dyn SnapshotClient>,
        credentials: Arc<CredentialStore>,
    ) -> Self {
        let registry = EventRegistry::new();
        let reconciler = Arc::new(Reconciler::new(local_user.clone()));

        let handler: Arc<dyn EventHandler> = reconciler.clone();
        let subscriptions = registry.subscribe_all(&Reconciler::KINDS, handler);

        let connection = ConnectionManager::new(transport, registry, credentials);
        let rooms = RoomSession::new(connection.clone(), snapshot.clone(), local_user);

        Self {
            connection,
            rooms,
            snapshot,
            reconciler,
            _reconciler_subscriptions: subscriptions,
        }
    }

    /// Builds a client talking to the configured backend over Socket.IO and
    /// REST. A configured token is stored but the channel is not opened.
    pub fn from_config(config: &AppConfig) -> Result<Self, ChatError> {
        let local_user = config
            .session
            .user_id()
            .map_err(|e| ChatError::Config(e.to_string()))?;

        let credentials = Arc::new(CredentialStore::new());
        if let Some(token) = config.session.auth_token() {
            credentials.set(token);
        }

        let endpoint = SocketIoTransport::endpoint_for(&config.api.base_url, &config.api.socket_path)?;
        let transport = SocketIoTransport::new(endpoint, config.api.connect_timeout());

        let snapshot = HttpSnapshotClient::new(
            HttpSnapshotConfig::new(config.api.base_url.clone())
                .with_api_prefix(config.api.api_prefix.clone())
                .with_timeout(config.api.request_timeout()),
            credentials.clone(),
        )
        .map_err(|e| ChatError::Config(format!("http client: {}", e)))?;

        Ok(Self::new(
            local_user,
            Arc::new(transport),
            Arc::new(snapshot),
            credentials,
        ))
    }

    // ════════════════════════════════════════════════════════════════════════
    // Connection
    // ════════════════════════════════════════════════════════════════════════

    pub async fn connect(&self, token: AuthToken) -> ConnectionState {
        self.connection.connect(token).await
    }

    /// Connects with the token already in the credential store.
    pub async fn connect_with_stored_token(&self) -> Result<ConnectionState, ChatError> {
        let token = self
            .connection
            .credentials()
            .current()
            .ok_or(ChatError::MissingCredential)?;
        Ok(self.connection.connect(token).await)
    }

    pub fn disconnect(&self) {
        self.connection.disconnect();
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    // ════════════════════════════════════════════════════════════════════════
    // Chats
    // ════════════════════════════════════════════════════════════════════════

    /// Fetches the chat list and merges it into the view.
    pub async fn load_chat_list(&self) -> Result<Vec<ChatSummary>, ChatError> {
        let summaries = self.snapshot.list_chats().await?;
        self.reconciler.load_summaries(summaries);
        Ok(self.reconciler.summaries())
    }

    /// Fetches a chat, merges its history and joins its room.
    ///
    /// Joining is best effort; while disconnected the timeline is still
    /// loaded and the caller can join after the next `Connected`.
    pub async fn open_chat(&self, chat_id: &ChatId) -> Result<Vec<Message>, ChatError> {
        let chat = self.snapshot.get_chat(chat_id).await?;
        let added = self.reconciler.load_chat(&chat);
        tracing::debug!(chat_id = %chat_id, added, "Chat loaded");
        self.rooms.join(chat_id);
        Ok(self.reconciler.messages(chat_id))
    }

    /// Starts (or resumes) a chat and loads it into the view.
    pub async fn start_chat(&self, request: StartChat) -> Result<ChatId, ChatError> {
        let chat = self.snapshot.start_chat(request).await?;
        self.reconciler.load_chat(&chat);
        self.rooms.join(&chat.id);
        Ok(chat.id)
    }

    pub async fn send(
        &self,
        chat_id: &ChatId,
        content: &str,
        kind: MessageKind,
    ) -> Result<SendOutcome, ChatError> {
        self.rooms.send(chat_id, content, kind).await
    }

    pub fn set_typing(&self, chat_id: &ChatId, is_typing: bool) -> bool {
        self.rooms.set_typing(chat_id, is_typing)
    }

    pub fn mark_read(&self, chat_id: &ChatId) -> bool {
        self.rooms.mark_read(chat_id)
    }

    pub async fn search(&self, chat_id: &ChatId, query: &str) -> Result<Vec<Message>, ChatError> {
        Ok(self.snapshot.search_messages(chat_id, query).await?)
    }

    /// Total unread as reported by the backend.
    pub async fn unread_count(&self) -> Result<u32, ChatError> {
        Ok(self.snapshot.unread_count().await?)
    }

    /// Archives a chat and drops it from the chat list.
    pub async fn archive_chat(&self, chat_id: &ChatId) -> Result<(), ChatError> {
        self.snapshot.archive_chat(chat_id).await?;
        self.reconciler.remove_summary(chat_id);
        Ok(())
    }

    // ════════════════════════════════════════════════════════════════════════
    // Accessors
    // ════════════════════════════════════════════════════════════════════════

    pub fn registry(&self) -> &EventRegistry {
        self.connection.registry()
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn rooms(&self) -> &RoomSession {
        &self.rooms
    }

    pub fn view(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn local_user(&self) -> &UserId {
        self.reconciler.local_user()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryChatBackend;
    use crate::config::{ApiConfig, LoggingConfig, SessionConfig};
    use crate::domain::chat::{TimelineStatus, UserProfile};
    use secrecy::Secret;

    fn client_for(backend: &InMemoryChatBackend, user: &str, token: &str) -> ChatClient {
        let credentials = Arc::new(CredentialStore::with_token(AuthToken::new(token).unwrap()));
        ChatClient::new(
            UserId::new(user).unwrap(),
            Arc::new(backend.transport()),
            Arc::new(backend.snapshot_client(credentials.clone())),
            credentials,
        )
    }

    fn backend() -> InMemoryChatBackend {
        let backend = InMemoryChatBackend::new();
        backend.register_user(
            UserProfile::named(UserId::new("buyer").unwrap(), "Asha"),
            "buyer-token",
        );
        backend.register_user(
            UserProfile::named(UserId::new("farmer").unwrap(), "Ravi"),
            "farmer-token",
        );
        backend
    }

    #[tokio::test]
    async fn connect_with_stored_token_uses_credential_store() {
        let backend = backend();
        let client = client_for(&backend, "buyer", "buyer-token");

        let state = client.connect_with_stored_token().await.unwrap();

        assert_eq!(state, ConnectionState::Connected);
        assert_eq!(backend.connection_count(), 1);
    }

    #[tokio::test]
    async fn connect_without_token_is_missing_credential() {
        let backend = backend();
        let client = ChatClient::new(
            UserId::new("buyer").unwrap(),
            Arc::new(backend.transport()),
            Arc::new(backend.snapshot_client(Arc::new(CredentialStore::new()))),
            Arc::new(CredentialStore::new()),
        );

        let err = client.connect_with_stored_token().await.unwrap_err();

        assert_eq!(err, ChatError::MissingCredential);
    }

    #[tokio::test]
    async fn start_chat_loads_timeline_and_summary() {
        let backend = backend();
        let client = client_for(&backend, "buyer", "buyer-token");

        let chat_id = client
            .start_chat(StartChat::with(UserId::new("farmer").unwrap()).with_message("Hello"))
            .await
            .unwrap();
        let summaries = client.load_chat_list().await.unwrap();

        assert_eq!(client.view().status(&chat_id), TimelineStatus::Loaded);
        assert_eq!(client.view().messages(&chat_id).len(), 1);
        assert_eq!(summaries.len(), 1);
    }

    #[tokio::test]
    async fn archive_removes_chat_from_list() {
        let backend = backend();
        let client = client_for(&backend, "buyer", "buyer-token");
        let chat_id = client
            .start_chat(StartChat::with(UserId::new("farmer").unwrap()))
            .await
            .unwrap();
        client.load_chat_list().await.unwrap();

        client.archive_chat(&chat_id).await.unwrap();

        assert!(client.view().summaries().is_empty());
        assert!(client.load_chat_list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn request_failures_surface_status() {
        let backend = backend();
        let client = client_for(&backend, "buyer", "buyer-token");

        let err = client.open_chat(&ChatId::new("missing").unwrap()).await.unwrap_err();

        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn from_config_rejects_bad_base_url() {
        let config = AppConfig {
            api: ApiConfig {
                base_url: "ftp://example.com".to_string(),
                ..Default::default()
            },
            session: SessionConfig {
                user_id: "buyer".to_string(),
                token: Some(Secret::new("jwt".to_string())),
            },
            logging: LoggingConfig::default(),
        };

        assert!(matches!(
            ChatClient::from_config(&config),
            Err(ChatError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn from_config_stores_configured_token() {
        let config = AppConfig {
            api: ApiConfig::default(),
            session: SessionConfig {
                user_id: "buyer".to_string(),
                token: Some(Secret::new("jwt".to_string())),
            },
            logging: LoggingConfig::default(),
        };

        let client = ChatClient::from_config(&config).unwrap();

        assert_eq!(client.local_user().as_str(), "buyer");
        assert_eq!(client.connection_state(), ConnectionState::Disconnected);
        assert_eq!(
            client.connection().credentials().current().unwrap().expose(),
            "jwt"
        );
    }
}
