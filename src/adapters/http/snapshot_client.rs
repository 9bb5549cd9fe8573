//! HTTP Snapshot Client - Implementation of SnapshotClient over the REST API.
//!
//! # Configuration
//!
//! ```ignore
//! let config = HttpSnapshotConfig::new("http://localhost:5000")
//!     .with_api_prefix("/api")
//!     .with_timeout(Duration::from_secs(30));
//!
//! let client = HttpSnapshotClient::new(config, credentials)?;
//! ```
//!
//! Every request carries the bearer token currently held in the shared
//! [`CredentialStore`]. Non-success statuses become
//! [`SnapshotError::RequestFailed`] with the body's `message`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use url::Url;

use crate::domain::chat::{Chat, ChatSummary, Message, MessageKind};
use crate::domain::foundation::{ChatId, CredentialStore};
use crate::ports::{SnapshotClient, SnapshotError, StartChat};

use super::dto::{
    ChatEnvelope, ChatsEnvelope, ErrorBody, MessageEnvelope, SearchEnvelope, SendMessageBody,
    StartChatBody, UnreadEnvelope,
};

/// Configuration for the HTTP snapshot client.
#[derive(Debug, Clone)]
pub struct HttpSnapshotConfig {
    /// Backend origin (default: http://localhost:5000).
    pub base_url: String,
    /// Path prefix of the REST API (default: /api).
    pub api_prefix: String,
    /// Request timeout.
    pub timeout: Duration,
}

impl HttpSnapshotConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_prefix: "/api".to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_api_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.api_prefix = prefix.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn api_root(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.api_prefix.trim_matches('/')
        )
        .trim_end_matches('/')
        .to_string()
    }
}

/// REST implementation of the snapshot port.
pub struct HttpSnapshotClient {
    client: Client,
    api_root: String,
    timeout: Duration,
    credentials: Arc<CredentialStore>,
}

impl HttpSnapshotClient {
    pub fn new(
        config: HttpSnapshotConfig,
        credentials: Arc<CredentialStore>,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            api_root: config.api_root(),
            timeout: config.timeout,
            credentials,
        })
    }

    /// Endpoint under the API root. Segments are percent-encoded, so ids
    /// holding `/`, `?` or `#` stay a single path segment.
    fn url(&self, segments: &[&str]) -> Result<Url, SnapshotError> {
        let invalid =
            |reason: String| SnapshotError::request_failed(400, format!("invalid API root: {}", reason));
        let mut url = Url::parse(&self.api_root).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| invalid(format!("'{}' cannot carry a path", self.api_root)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, SnapshotError> {
        let token = self
            .credentials
            .current()
            .ok_or_else(SnapshotError::unauthenticated)?;
        Ok(request.bearer_auth(token.expose()))
    }

    async fn execute(&self, request: RequestBuilder) -> Result<Response, SnapshotError> {
        let response = self
            .authorized(request)?
            .send()
            .await
            .map_err(|e| self.transport_failure(e))?;
        Self::check_status(response).await
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, SnapshotError> {
        let response = self.execute(request).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| SnapshotError::Decode(e.to_string()))
    }

    fn transport_failure(&self, e: reqwest::Error) -> SnapshotError {
        if e.is_timeout() {
            SnapshotError::request_failed(
                504,
                format!("request timed out after {}s", self.timeout.as_secs()),
            )
        } else if e.is_connect() {
            SnapshotError::request_failed(503, format!("Connection failed: {}", e))
        } else {
            SnapshotError::request_failed(503, e.to_string())
        }
    }

    /// Maps non-success responses to `RequestFailed`.
    async fn check_status(response: Response) -> Result<Response, SnapshotError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.message)
            .unwrap_or_else(|_| {
                if body.trim().is_empty() {
                    status
                        .canonical_reason()
                        .unwrap_or("Request failed")
                        .to_string()
                } else {
                    body
                }
            });

        tracing::debug!(status = status.as_u16(), message = %message, "Snapshot request failed");
        Err(SnapshotError::request_failed(status.as_u16(), message))
    }
}

#[async_trait]
impl SnapshotClient for HttpSnapshotClient {
    async fn list_chats(&self) -> Result<Vec<ChatSummary>, SnapshotError> {
        let envelope: ChatsEnvelope = self.fetch(self.client.get(self.url(&["chats"])?)).await?;
        Ok(envelope.chats)
    }

    async fn get_chat(&self, chat_id: &ChatId) -> Result<Chat, SnapshotError> {
        let envelope: ChatEnvelope = self
            .fetch(self.client.get(self.url(&["chats", chat_id.as_str()])?))
            .await?;
        Chat::try_from(envelope.chat).map_err(|e| SnapshotError::Decode(e.to_string()))
    }

    async fn start_chat(&self, request: StartChat) -> Result<Chat, SnapshotError> {
        let body = StartChatBody {
            recipient_id: &request.recipient_id,
            crop_id: request.item.as_ref(),
            initial_message: request.initial_message.as_deref(),
        };
        let envelope: ChatEnvelope = self
            .fetch(self.client.post(self.url(&["chats", "start"])?).json(&body))
            .await?;
        Chat::try_from(envelope.chat).map_err(|e| SnapshotError::Decode(e.to_string()))
    }

    async fn send_message(
        &self,
        chat_id: &ChatId,
        content: &str,
        kind: MessageKind,
    ) -> Result<Message, SnapshotError> {
        let body = SendMessageBody { content, kind };
        let envelope: MessageEnvelope = self
            .fetch(
                self.client
                    .post(self.url(&["chats", chat_id.as_str(), "messages"])?)
                    .json(&body),
            )
            .await?;
        Ok(envelope.message)
    }

    async fn search_messages(
        &self,
        chat_id: &ChatId,
        query: &str,
    ) -> Result<Vec<Message>, SnapshotError> {
        let envelope: SearchEnvelope = self
            .fetch(
                self.client
                    .get(self.url(&["chats", chat_id.as_str(), "search"])?)
                    .query(&[("q", query)]),
            )
            .await?;
        Ok(envelope.results)
    }

    async fn unread_count(&self) -> Result<u32, SnapshotError> {
        let envelope: UnreadEnvelope = self
            .fetch(self.client.get(self.url(&["chats", "unread", "count"])?))
            .await?;
        Ok(envelope.unread_count)
    }

    async fn archive_chat(&self, chat_id: &ChatId) -> Result<(), SnapshotError> {
        self.execute(
            self.client
                .patch(self.url(&["chats", chat_id.as_str(), "archive"])?),
        )
        .await?;
        Ok(())
    }
}
