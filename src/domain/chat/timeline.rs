//! Per-chat authoritative message sequence.
//!
//! A timeline merges a snapshot with live deliveries:
//!
//! - live messages append only when their identity is unseen
//! - the first snapshot replaces the sequence, then re-appends anything that
//!   arrived live before it and is missing from it
//! - later snapshots only add unseen messages
//!
//! Order is arrival order; timestamps are never used to reorder.

use std::collections::HashSet;

use crate::domain::foundation::{MessageId, StateMachine, UserId};

use super::message::Message;

/// Load state of a timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimelineStatus {
    #[default]
    Uninitialized,
    Loaded,
}

impl StateMachine for TimelineStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        matches!(
            (self, target),
            (TimelineStatus::Uninitialized, TimelineStatus::Loaded)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        match self {
            TimelineStatus::Uninitialized => vec![TimelineStatus::Loaded],
            TimelineStatus::Loaded => vec![],
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChatTimeline {
    status: TimelineStatus,
    messages: Vec<Message>,
    seen: HashSet<MessageId>,
}

impl ChatTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> TimelineStatus {
        self.status
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.seen.contains(id)
    }

    /// Appends a live message. Returns false for a duplicate identity.
    pub fn append(&mut self, message: Message) -> bool {
        if !self.seen.insert(message.id.clone()) {
            return false;
        }
        self.messages.push(message);
        true
    }

    /// Merges a snapshot. Returns how many messages were added.
    pub fn load_snapshot(&mut self, snapshot: Vec<Message>) -> usize {
        match self.status {
            TimelineStatus::Uninitialized => {
                let early = std::mem::take(&mut self.messages);
                self.seen.clear();
                for message in snapshot {
                    self.append(message);
                }
                for message in early {
                    self.append(message);
                }
                self.status = TimelineStatus::Loaded;
                self.messages.len()
            }
            TimelineStatus::Loaded => snapshot
                .into_iter()
                .map(|message| self.append(message))
                .filter(|added| *added)
                .count(),
        }
    }

    /// Flags messages not authored by `reader` as read.
    pub fn mark_read_by(&mut self, reader: &UserId) {
        for message in self.messages.iter_mut() {
            if !message.is_from(reader) {
                message.is_read = true;
            }
        }
    }
}
