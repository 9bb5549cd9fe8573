//! Chat aggregate and list summaries.
//!
//! A chat is a one-to-one conversation, optionally scoped to a marketplace
//! item. The client mirrors chats; the mutating methods here are what a
//! backend applies when it accepts an action, and what the in-memory backend
//! adapter uses to reproduce the server's behavior.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::foundation::{ChatId, StateMachine, Timestamp, UserId, ValidationError};

use super::message::Message;
use super::participant::{Participant, ParticipantRole};
use super::profile::{ItemRef, UserProfile};

/// Upper bound on search results, newest matches kept.
pub const MAX_SEARCH_RESULTS: usize = 50;

/// Chat lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatStatus {
    #[default]
    Active,
    Archived,
    Blocked,
}

impl StateMachine for ChatStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use ChatStatus::*;
        matches!(
            (self, target),
            (Active, Archived) | (Active, Blocked) | (Archived, Active) | (Blocked, Active)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use ChatStatus::*;
        match self {
            Active => vec![Archived, Blocked],
            Archived => vec![Active],
            Blocked => vec![Active],
        }
    }
}

/// A one-to-one chat with its full message history.
///
/// # Invariants
///
/// - exactly two participants, one initiator and one respondent
/// - messages are in arrival order
/// - unread counters only reset through [`Chat::mark_read_by`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chat {
    pub id: ChatId,
    pub participants: Vec<Participant>,
    pub messages: Vec<Message>,
    pub related_item: Option<ItemRef>,
    pub related_order: Option<String>,
    pub status: ChatStatus,
    pub last_activity: Timestamp,
    unread: HashMap<UserId, u32>,
}

impl Chat {
    /// Creates a new empty chat between two distinct users.
    pub fn start(
        id: ChatId,
        initiator: UserProfile,
        respondent: UserProfile,
        related_item: Option<ItemRef>,
        now: Timestamp,
    ) -> Result<Self, ValidationError> {
        if initiator.id == respondent.id {
            return Err(ValidationError::invalid_format(
                "recipient_id",
                "cannot start a chat with yourself",
            ));
        }
        Ok(Self {
            id,
            participants: vec![
                Participant::new(initiator, ParticipantRole::Initiator, now),
                Participant::new(respondent, ParticipantRole::Respondent, now),
            ],
            messages: Vec::new(),
            related_item,
            related_order: None,
            status: ChatStatus::Active,
            last_activity: now,
            unread: HashMap::new(),
        })
    }

    /// Reassembles a chat mirrored from a backend snapshot.
    pub fn from_parts(
        id: ChatId,
        participants: Vec<Participant>,
        messages: Vec<Message>,
        related_item: Option<ItemRef>,
        status: ChatStatus,
        last_activity: Timestamp,
        unread: HashMap<UserId, u32>,
    ) -> Result<Self, ValidationError> {
        if participants.len() != 2 {
            return Err(ValidationError::invalid_format(
                "participants",
                format!("expected 2 participants, got {}", participants.len()),
            ));
        }
        Ok(Self {
            id,
            participants,
            messages,
            related_item,
            related_order: None,
            status,
            last_activity,
            unread,
        })
    }

    /// Returns true if `user` is one of the two participants.
    pub fn is_participant(&self, user: &UserId) -> bool {
        self.participants.iter().any(|p| p.user_id() == user)
    }

    /// Returns the participant that is not `me`.
    pub fn other_participant(&self, me: &UserId) -> Option<&Participant> {
        self.participants.iter().find(|p| p.user_id() != me)
    }

    /// Returns the participant with the given user id.
    pub fn participant(&self, user: &UserId) -> Option<&Participant> {
        self.participants.iter().find(|p| p.user_id() == user)
    }

    /// Returns true if the chat is between exactly these two users.
    pub fn is_between(&self, a: &UserId, b: &UserId) -> bool {
        self.is_participant(a) && self.is_participant(b)
    }

    /// Unread count for a participant.
    pub fn unread_for(&self, user: &UserId) -> u32 {
        self.unread.get(user).copied().unwrap_or(0)
    }

    /// Appends an accepted message and bumps the other side's unread count.
    pub fn add_message(&mut self, message: Message) {
        self.last_activity = message.created_at;
        for participant in &self.participants {
            if !message.is_from(participant.user_id()) {
                *self.unread.entry(participant.user_id().clone()).or_insert(0) += 1;
            }
        }
        self.messages.push(message);
    }

    /// Applies a read acknowledgment from `reader`.
    ///
    /// Flags every message from the other side as read, resets the reader's
    /// unread counter and refreshes their last-seen time.
    pub fn mark_read_by(&mut self, reader: &UserId, now: Timestamp) {
        for message in self.messages.iter_mut() {
            if !message.is_from(reader) {
                message.is_read = true;
            }
        }
        self.unread.insert(reader.clone(), 0);
        if let Some(participant) = self
            .participants
            .iter_mut()
            .find(|p| p.user_id() == reader)
        {
            participant.last_seen = Some(now);
        }
    }

    /// Moves the chat to archived. Archiving twice is a no-op.
    pub fn archive(&mut self) -> Result<(), ValidationError> {
        if self.status == ChatStatus::Archived {
            return Ok(());
        }
        self.status = self.status.transition_to(ChatStatus::Archived)?;
        Ok(())
    }

    /// Case-insensitive substring search, newest matches kept.
    pub fn search(&self, query: &str) -> Vec<Message> {
        let matches: Vec<&Message> = self.messages.iter().filter(|m| m.matches(query)).collect();
        let skip = matches.len().saturating_sub(MAX_SEARCH_RESULTS);
        matches.into_iter().skip(skip).cloned().collect()
    }

    /// Builds the list entry the given viewer sees.
    pub fn summary_for(&self, viewer: &UserId) -> ChatSummary {
        ChatSummary {
            id: self.id.clone(),
            other_user: self.other_participant(viewer).map(|p| p.user.clone()),
            related_item: self.related_item.clone(),
            last_message: self.messages.last().map(LastMessagePreview::from),
            unread_count: self.unread_for(viewer),
            last_activity: self.last_activity,
        }
    }
}

/// Preview of the newest message in a chat list entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastMessagePreview {
    pub content: String,
    pub timestamp: Timestamp,
    pub sender: UserProfile,
}

impl From<&Message> for LastMessagePreview {
    fn from(message: &Message) -> Self {
        Self {
            content: message.content.clone(),
            timestamp: message.created_at,
            sender: message.sender.clone(),
        }
    }
}

/// One row of the chat list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSummary {
    pub id: ChatId,
    #[serde(default)]
    pub other_user: Option<UserProfile>,
    #[serde(rename = "relatedCrop", default)]
    pub related_item: Option<ItemRef>,
    #[serde(default)]
    pub last_message: Option<LastMessagePreview>,
    #[serde(default)]
    pub unread_count: u32,
    pub last_activity: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::chat::MessageKind;
    use crate::domain::foundation::MessageId;

    fn user(id: &str) -> UserProfile {
        UserProfile::named(UserId::new(id).unwrap(), id.to_uppercase())
    }

    fn chat() -> Chat {
        Chat::start(
            ChatId::new("c-1").unwrap(),
            user("buyer"),
            user("farmer"),
            None,
            Timestamp::now(),
        )
        .unwrap()
    }

    fn message(id: &str, from: &str, content: &str) -> Message {
        Message::accepted(
            MessageId::new(id).unwrap(),
            user(from),
            content,
            MessageKind::Text,
            Timestamp::now(),
        )
    }

    #[test]
    fn start_creates_two_participants_and_no_messages() {
        let chat = chat();
        assert_eq!(chat.participants.len(), 2);
        assert_eq!(chat.participants[0].role, ParticipantRole::Initiator);
        assert_eq!(chat.participants[1].role, ParticipantRole::Respondent);
        assert!(chat.messages.is_empty());
    }

    #[test]
    fn start_rejects_chat_with_self() {
        let result = Chat::start(
            ChatId::new("c").unwrap(),
            user("a"),
            user("a"),
            None,
            Timestamp::now(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn add_message_increments_only_the_recipient() {
        let mut chat = chat();
        let buyer = UserId::new("buyer").unwrap();
        let farmer = UserId::new("farmer").unwrap();

        chat.add_message(message("m1", "buyer", "hi"));
        chat.add_message(message("m2", "buyer", "anyone?"));

        assert_eq!(chat.unread_for(&farmer), 2);
        assert_eq!(chat.unread_for(&buyer), 0);
    }

    #[test]
    fn mark_read_resets_reader_and_flags_messages() {
        let mut chat = chat();
        let farmer = UserId::new("farmer").unwrap();
        chat.add_message(message("m1", "buyer", "hi"));
        chat.add_message(message("m2", "farmer", "hello"));

        chat.mark_read_by(&farmer, Timestamp::now());

        assert_eq!(chat.unread_for(&farmer), 0);
        assert!(chat.messages[0].is_read);
        assert!(!chat.messages[1].is_read);
    }

    #[test]
    fn archive_is_idempotent() {
        let mut chat = chat();
        chat.archive().unwrap();
        chat.archive().unwrap();
        assert_eq!(chat.status, ChatStatus::Archived);
    }

    #[test]
    fn blocked_chat_cannot_be_archived() {
        let mut chat = chat();
        chat.status = ChatStatus::Blocked;
        assert!(chat.archive().is_err());
    }

    #[test]
    fn search_keeps_newest_fifty_matches() {
        let mut chat = chat();
        for i in 0..60 {
            chat.add_message(message(&format!("m{}", i), "buyer", &format!("rice #{}", i)));
        }
        chat.add_message(message("other", "buyer", "wheat"));

        let results = chat.search("RICE");
        assert_eq!(results.len(), MAX_SEARCH_RESULTS);
        assert_eq!(results[0].id.as_str(), "m10");
        assert_eq!(results.last().unwrap().id.as_str(), "m59");
    }

    #[test]
    fn summary_shows_other_user_and_last_message() {
        let mut chat = chat();
        chat.add_message(message("m1", "farmer", "fresh stock"));
        let buyer = UserId::new("buyer").unwrap();

        let summary = chat.summary_for(&buyer);

        assert_eq!(summary.other_user.unwrap().id.as_str(), "farmer");
        assert_eq!(summary.last_message.unwrap().content, "fresh stock");
        assert_eq!(summary.unread_count, 1);
    }

    #[test]
    fn from_parts_requires_two_participants() {
        let result = Chat::from_parts(
            ChatId::new("c").unwrap(),
            vec![],
            vec![],
            None,
            ChatStatus::Active,
            Timestamp::now(),
            HashMap::new(),
        );
        assert!(result.is_err());
    }
}
