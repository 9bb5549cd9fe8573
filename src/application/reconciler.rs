//! Reconciler - Merges snapshots with live events into the client's view.
//!
//! Registered on the event registry for every chat-scoped kind plus
//! `ConnectionChanged`. Holds, per chat, the message timeline and unread
//! counter of the local participant, plus the chat list and typing state.
//!
//! Rules:
//! - a message is applied at most once per identity, whichever path
//!   (`new_message`, `chat_notification`, local fallback publish) brings it
//! - unread counts rise only for messages from others and reset only on a
//!   read acknowledgment by the local participant; a snapshot can raise a
//!   counter but never lower it
//! - typing signals touch typing state only; a message from a participant
//!   clears their typing flag
//! - typing state is discarded when the connection drops
//! - a message from someone else in a chat missing from the list adds a row

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use crate::domain::chat::{
    Chat, ChatEvent, ChatSummary, ChatTimeline, ConnectionState, EventKind, LastMessagePreview,
    Message, TimelineStatus, TypingEvent, TypingState,
};
use crate::domain::foundation::{ChatId, MessageId, UserId};
use crate::ports::{DispatchError, EventHandler};

#[derive(Default)]
struct ViewState {
    timelines: HashMap<ChatId, ChatTimeline>,
    unread: HashMap<ChatId, u32>,
    /// Unread messages from others applied live since the last local read.
    live_unread: HashMap<ChatId, HashSet<MessageId>>,
    summaries: Vec<ChatSummary>,
    typing: TypingState,
}

impl ViewState {
    fn apply_message(&mut self, local_user: &UserId, chat_id: &ChatId, message: &Message) {
        let appended = self
            .timelines
            .entry(chat_id.clone())
            .or_default()
            .append(message.clone());
        if !appended {
            tracing::trace!(chat_id = %chat_id, message_id = %message.id, "Duplicate message ignored");
            return;
        }

        let from_other = !message.is_from(local_user);
        let unread = self.unread.entry(chat_id.clone()).or_insert(0);
        if from_other {
            *unread += 1;
            self.live_unread
                .entry(chat_id.clone())
                .or_default()
                .insert(message.id.clone());
        }
        let unread = *unread;

        self.typing.set(chat_id, message.sender_id(), false);

        match self.summaries.iter_mut().find(|s| &s.id == chat_id) {
            Some(summary) => {
                summary.last_message = Some(LastMessagePreview::from(message));
                if message.created_at.is_after(&summary.last_activity) {
                    summary.last_activity = message.created_at;
                }
                summary.unread_count = unread;
            }
            // Own messages do not say who the other participant is
            None if from_other => self.summaries.push(ChatSummary {
                id: chat_id.clone(),
                other_user: Some(message.sender.clone()),
                related_item: None,
                last_message: Some(LastMessagePreview::from(message)),
                unread_count: unread,
                last_activity: message.created_at,
            }),
            None => return,
        }
        self.sort_summaries();
    }

    /// Merges a snapshot's unread count for a chat into the local one.
    ///
    /// `snapshot_ids` lists the messages the snapshot already counted, if
    /// known; live messages outside it are added on top. Without ids the
    /// larger count wins.
    fn merge_unread(
        &mut self,
        chat_id: &ChatId,
        snapshot_unread: u32,
        snapshot_ids: Option<&HashSet<&MessageId>>,
    ) -> u32 {
        let local = self.unread.get(chat_id).copied().unwrap_or(0);
        let live_missing = match (snapshot_ids, self.live_unread.get(chat_id)) {
            (Some(ids), Some(live)) => live.iter().filter(|id| !ids.contains(id)).count() as u32,
            _ => 0,
        };
        let merged = local.max(snapshot_unread + live_missing);
        self.unread.insert(chat_id.clone(), merged);
        merged
    }

    fn apply_read(&mut self, local_user: &UserId, chat_id: &ChatId, reader: &UserId) {
        if reader == local_user {
            self.unread.insert(chat_id.clone(), 0);
            self.live_unread.remove(chat_id);
            if let Some(summary) = self.summaries.iter_mut().find(|s| &s.id == chat_id) {
                summary.unread_count = 0;
            }
        } else if let Some(timeline) = self.timelines.get_mut(chat_id) {
            timeline.mark_read_by(reader);
        }
    }

    fn apply_typing(&mut self, local_user: &UserId, event: &TypingEvent) {
        if &event.user_id == local_user {
            return;
        }
        match &event.chat_id {
            Some(chat_id) => {
                self.typing.set(chat_id, &event.user_id, event.is_typing);
            }
            None => {
                tracing::debug!(user_id = %event.user_id, "Typing event without chat ignored");
            }
        }
    }

    fn sort_summaries(&mut self) {
        self.summaries
            .sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
    }
}

/// The client's reconciled view of its chats.
pub struct Reconciler {
    local_user: UserId,
    state: Mutex<ViewState>,
}

impl Reconciler {
    /// Event kinds the reconciler must be subscribed to.
    pub const KINDS: [EventKind; 5] = [
        EventKind::ConnectionChanged,
        EventKind::NewMessage,
        EventKind::ChatNotification,
        EventKind::UserTyping,
        EventKind::MessagesRead,
    ];

    pub fn new(local_user: UserId) -> Self {
        Self {
            local_user,
            state: Mutex::new(ViewState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, ViewState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn local_user(&self) -> &UserId {
        &self.local_user
    }

    /// Merges a fetched chat. Returns how many messages were added.
    ///
    /// The first load replaces the timeline (keeping live messages the
    /// snapshot does not have); later loads only add what is missing.
    pub fn load_chat(&self, chat: &Chat) -> usize {
        let mut state = self.state();
        let added = state
            .timelines
            .entry(chat.id.clone())
            .or_default()
            .load_snapshot(chat.messages.clone());

        let snapshot_ids: HashSet<&MessageId> = chat.messages.iter().map(|m| &m.id).collect();
        let unread = state.merge_unread(
            &chat.id,
            chat.unread_for(&self.local_user),
            Some(&snapshot_ids),
        );

        let mut summary = chat.summary_for(&self.local_user);
        summary.unread_count = unread;
        match state.summaries.iter_mut().find(|s| s.id == chat.id) {
            Some(existing) => {
                if summary.last_activity.is_after(&existing.last_activity) {
                    *existing = summary;
                } else {
                    existing.unread_count = unread;
                }
            }
            None => state.summaries.push(summary),
        }
        state.sort_summaries();

        tracing::debug!(chat_id = %chat.id, added, "Chat snapshot merged");
        added
    }

    /// Replaces the chat list with a fetched one.
    ///
    /// Unread counts already raised by live messages are kept.
    pub fn load_summaries(&self, mut summaries: Vec<ChatSummary>) {
        let mut state = self.state();
        for summary in summaries.iter_mut() {
            summary.unread_count = state.merge_unread(&summary.id, summary.unread_count, None);
        }
        state.summaries = summaries;
        state.sort_summaries();
    }

    /// Drops a chat from the list (after archiving it).
    pub fn remove_summary(&self, chat_id: &ChatId) {
        self.state().summaries.retain(|s| &s.id != chat_id);
    }

    pub fn messages(&self, chat_id: &ChatId) -> Vec<Message> {
        self.state()
            .timelines
            .get(chat_id)
            .map(|t| t.messages().to_vec())
            .unwrap_or_default()
    }

    pub fn status(&self, chat_id: &ChatId) -> TimelineStatus {
        self.state()
            .timelines
            .get(chat_id)
            .map(ChatTimeline::status)
            .unwrap_or_default()
    }

    /// Chat list, most recent activity first.
    pub fn summaries(&self) -> Vec<ChatSummary> {
        self.state().summaries.clone()
    }

    pub fn unread(&self, chat_id: &ChatId) -> u32 {
        self.state().unread.get(chat_id).copied().unwrap_or(0)
    }

    pub fn total_unread(&self) -> u32 {
        self.state().unread.values().sum()
    }

    pub fn typing_users(&self, chat_id: &ChatId) -> Vec<UserId> {
        self.state().typing.typing_in(chat_id)
    }

    /// True if anyone is marked typing in any chat.
    pub fn has_typing(&self) -> bool {
        !self.state().typing.is_empty()
    }
}

impl EventHandler for Reconciler {
    fn handle(&self, event: &ChatEvent) -> Result<(), DispatchError> {
        let mut state = self.state();
        match event {
            ChatEvent::NewMessage(e) => state.apply_message(&self.local_user, &e.chat_id, &e.message),
            ChatEvent::ChatNotification(e) => {
                if let Some(message) = &e.message {
                    state.apply_message(&self.local_user, &e.chat_id, message);
                }
            }
            ChatEvent::UserTyping(e) => state.apply_typing(&self.local_user, e),
            ChatEvent::MessagesRead(e) => state.apply_read(&self.local_user, &e.chat_id, &e.read_by),
            ChatEvent::ConnectionChanged(ConnectionState::Disconnected) => state.typing.clear(),
            ChatEvent::ConnectionChanged(_) | ChatEvent::TransportError(_) => {}
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "Reconciler"
    }
}
