//! Snapshot client backed by the in-memory chat backend.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::chat::{
    validate_content, Chat, ChatStatus, ChatSummary, ItemRef, Message, MessageKind,
};
use crate::domain::foundation::{ChatId, CredentialStore, MessageId, Timestamp, UserId};
use crate::ports::{SnapshotClient, SnapshotError, StartChat};

use super::backend::{BackendState, InMemoryChatBackend};

/// Chat list page size, matching the REST API.
const CHAT_LIST_LIMIT: usize = 50;

/// Acts as the user whose token is in the credential store.
pub struct InMemorySnapshotClient {
    backend: InMemoryChatBackend,
    credentials: Arc<CredentialStore>,
}

impl InMemorySnapshotClient {
    pub fn new(backend: InMemoryChatBackend, credentials: Arc<CredentialStore>) -> Self {
        Self {
            backend,
            credentials,
        }
    }

    fn caller(&self, state: &BackendState) -> Result<UserId, SnapshotError> {
        let token = self
            .credentials
            .current()
            .ok_or_else(SnapshotError::unauthenticated)?;
        state
            .user_for_token(token.expose())
            .map(|u| u.id.clone())
            .ok_or_else(|| SnapshotError::request_failed(401, "Token is not valid"))
    }
}

fn invalid(e: impl std::fmt::Display) -> SnapshotError {
    SnapshotError::request_failed(400, e.to_string())
}

#[async_trait]
impl SnapshotClient for InMemorySnapshotClient {
    async fn list_chats(&self) -> Result<Vec<ChatSummary>, SnapshotError> {
        let state = self.backend.lock();
        let me = self.caller(&state)?;

        let mut chats: Vec<&Chat> = state
            .chats
            .iter()
            .filter(|c| c.is_participant(&me) && c.status == ChatStatus::Active)
            .collect();
        chats.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));

        Ok(chats
            .into_iter()
            .take(CHAT_LIST_LIMIT)
            .map(|c| c.summary_for(&me))
            .collect())
    }

    async fn get_chat(&self, chat_id: &ChatId) -> Result<Chat, SnapshotError> {
        let state = self.backend.lock();
        let me = self.caller(&state)?;
        state
            .chat_for(chat_id, &me)
            .cloned()
            .ok_or_else(|| SnapshotError::not_found("Chat"))
    }

    async fn start_chat(&self, request: StartChat) -> Result<Chat, SnapshotError> {
        let mut state = self.backend.lock();
        let me = self.caller(&state)?;

        let recipient = state
            .users
            .get(&request.recipient_id)
            .cloned()
            .ok_or_else(|| SnapshotError::not_found("Recipient"))?;
        if let Some(content) = &request.initial_message {
            validate_content(content).map_err(invalid)?;
        }

        let existing = state.chats.iter().position(|c| {
            c.is_between(&me, &recipient.id)
                && match &request.item {
                    Some(item) => c.related_item.as_ref().map(|i| &i.id) == Some(item),
                    None => true,
                }
        });

        let index = match existing {
            Some(index) => index,
            None => {
                let initiator = state
                    .users
                    .get(&me)
                    .cloned()
                    .ok_or_else(SnapshotError::unauthenticated)?;
                let chat = Chat::start(
                    ChatId::generate(),
                    initiator,
                    recipient,
                    request.item.map(ItemRef::id_only),
                    Timestamp::now(),
                )
                .map_err(invalid)?;
                state.chats.push(chat);
                state.chats.len() - 1
            }
        };

        if let Some(content) = request.initial_message {
            let sender = state
                .users
                .get(&me)
                .cloned()
                .ok_or_else(SnapshotError::unauthenticated)?;
            let message = Message::accepted(
                MessageId::generate(),
                sender,
                content,
                MessageKind::Text,
                Timestamp::now(),
            );
            state.chats[index].add_message(message);
        }

        Ok(state.chats[index].clone())
    }

    async fn send_message(
        &self,
        chat_id: &ChatId,
        content: &str,
        kind: MessageKind,
    ) -> Result<Message, SnapshotError> {
        let mut state = self.backend.lock();
        let me = self.caller(&state)?;
        validate_content(content).map_err(invalid)?;

        let sender = state
            .users
            .get(&me)
            .cloned()
            .ok_or_else(SnapshotError::unauthenticated)?;
        let chat = state
            .chat_for_mut(chat_id, &me)
            .ok_or_else(|| SnapshotError::not_found("Chat"))?;

        let message = Message::accepted(
            MessageId::generate(),
            sender,
            content,
            kind,
            Timestamp::now(),
        );
        chat.add_message(message.clone());
        Ok(message)
    }

    async fn search_messages(
        &self,
        chat_id: &ChatId,
        query: &str,
    ) -> Result<Vec<Message>, SnapshotError> {
        let state = self.backend.lock();
        let me = self.caller(&state)?;
        if query.trim().is_empty() {
            return Err(SnapshotError::request_failed(400, "Search query required"));
        }
        state
            .chat_for(chat_id, &me)
            .map(|c| c.search(query))
            .ok_or_else(|| SnapshotError::not_found("Chat"))
    }

    async fn unread_count(&self) -> Result<u32, SnapshotError> {
        let state = self.backend.lock();
        let me = self.caller(&state)?;
        Ok(state
            .chats
            .iter()
            .filter(|c| c.is_participant(&me) && c.status == ChatStatus::Active)
            .map(|c| c.unread_for(&me))
            .sum())
    }

    async fn archive_chat(&self, chat_id: &ChatId) -> Result<(), SnapshotError> {
        let mut state = self.backend.lock();
        let me = self.caller(&state)?;
        state
            .chat_for_mut(chat_id, &me)
            .ok_or_else(|| SnapshotError::not_found("Chat"))?
            .archive()
            .map_err(invalid)
    }
}
