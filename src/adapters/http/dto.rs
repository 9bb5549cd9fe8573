//! Wire shapes of the chat REST API.
//!
//! Responses are wrapped in single-key envelopes (`{chats}`, `{chat}`,
//! `{message}`, `{results}`, `{unreadCount}`); errors carry `{message}`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::domain::chat::{
    AccountType, Chat, ChatStatus, ChatSummary, ItemRef, Message, MessageKind, Participant,
    ParticipantRole, UserProfile,
};
use crate::domain::foundation::{ChatId, ItemId, Timestamp, UserId, ValidationError};

#[derive(Debug, Deserialize)]
pub struct ChatsEnvelope {
    pub chats: Vec<ChatSummary>,
}

#[derive(Debug, Deserialize)]
pub struct ChatEnvelope {
    pub chat: ChatDto,
}

#[derive(Debug, Deserialize)]
pub struct MessageEnvelope {
    pub message: Message,
}

#[derive(Debug, Deserialize)]
pub struct SearchEnvelope {
    pub results: Vec<Message>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadEnvelope {
    pub unread_count: u32,
}

#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartChatBody<'a> {
    pub recipient_id: &'a UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crop_id: Option<&'a ItemId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_message: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct SendMessageBody<'a> {
    pub content: &'a str,
    #[serde(rename = "type")]
    pub kind: MessageKind,
}

/// A chat document as the backend serializes it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatDto {
    #[serde(rename = "_id", alias = "id")]
    pub id: ChatId,
    pub participants: Vec<ParticipantDto>,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub related_crop: Option<ItemRef>,
    #[serde(default)]
    pub related_order: Option<String>,
    #[serde(default)]
    pub status: ChatStatus,
    pub last_activity: Timestamp,
    #[serde(default)]
    pub metadata: ChatMetadataDto,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantDto {
    pub user: UserProfile,
    #[serde(default)]
    pub joined_at: Option<Timestamp>,
    #[serde(default)]
    pub last_seen: Option<Timestamp>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMetadataDto {
    #[serde(default)]
    pub unread_count: UnreadCountDto,
}

/// The backend keys unread counters by account type, not by user.
#[derive(Debug, Default, Deserialize)]
pub struct UnreadCountDto {
    #[serde(default)]
    pub farmer: u32,
    #[serde(default)]
    pub buyer: u32,
}

impl UnreadCountDto {
    fn for_account(&self, account_type: Option<AccountType>) -> u32 {
        match account_type {
            Some(AccountType::Farmer) => self.farmer,
            _ => self.buyer,
        }
    }
}

impl TryFrom<ChatDto> for Chat {
    type Error = ValidationError;

    fn try_from(dto: ChatDto) -> Result<Self, Self::Error> {
        let unread: HashMap<UserId, u32> = dto
            .participants
            .iter()
            .map(|p| {
                (
                    p.user.id.clone(),
                    dto.metadata.unread_count.for_account(p.user.account_type),
                )
            })
            .collect();

        // The starter is stored first
        let participants = dto
            .participants
            .into_iter()
            .enumerate()
            .map(|(index, p)| Participant {
                user: p.user,
                role: if index == 0 {
                    ParticipantRole::Initiator
                } else {
                    ParticipantRole::Respondent
                },
                joined_at: p.joined_at,
                last_seen: p.last_seen,
            })
            .collect();

        let mut chat = Chat::from_parts(
            dto.id,
            participants,
            dto.messages,
            dto.related_crop,
            dto.status,
            dto.last_activity,
            unread,
        )?;
        chat.related_order = dto.related_order;
        Ok(chat)
    }
}
