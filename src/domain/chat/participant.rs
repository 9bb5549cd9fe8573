//! Chat participants.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{Timestamp, UserId};

use super::profile::UserProfile;

/// Role of a participant in a one-to-one chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantRole {
    /// The user who started the chat.
    Initiator,
    /// The user the chat was started with.
    Respondent,
}

/// One side of a chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub user: UserProfile,
    pub role: ParticipantRole,
    pub joined_at: Option<Timestamp>,
    pub last_seen: Option<Timestamp>,
}

impl Participant {
    /// Creates a participant that joined and was last seen at `now`.
    pub fn new(user: UserProfile, role: ParticipantRole, now: Timestamp) -> Self {
        Self {
            user,
            role,
            joined_at: Some(now),
            last_seen: Some(now),
        }
    }

    /// Returns the participant's user id.
    pub fn user_id(&self) -> &UserId {
        &self.user.id
    }
}
