//! Ephemeral typing indicators.

use std::collections::{HashMap, HashSet};

use crate::domain::foundation::{ChatId, UserId};

/// Who is currently typing in which chat.
///
/// Keyed by (chat, participant). Never persisted; cleared on teardown.
#[derive(Debug, Clone, Default)]
pub struct TypingState {
    typing: HashMap<ChatId, HashSet<UserId>>,
}

impl TypingState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a typing signal. Returns true if the state changed.
    pub fn set(&mut self, chat_id: &ChatId, user_id: &UserId, is_typing: bool) -> bool {
        if is_typing {
            self.typing
                .entry(chat_id.clone())
                .or_default()
                .insert(user_id.clone())
        } else {
            let Some(users) = self.typing.get_mut(chat_id) else {
                return false;
            };
            let removed = users.remove(user_id);
            if users.is_empty() {
                self.typing.remove(chat_id);
            }
            removed
        }
    }

    pub fn is_typing(&self, chat_id: &ChatId, user_id: &UserId) -> bool {
        self.typing
            .get(chat_id)
            .is_some_and(|users| users.contains(user_id))
    }

    /// Users typing in a chat, in a stable order.
    pub fn typing_in(&self, chat_id: &ChatId) -> Vec<UserId> {
        let mut users: Vec<UserId> = self
            .typing
            .get(chat_id)
            .map(|users| users.iter().cloned().collect())
            .unwrap_or_default();
        users.sort();
        users
    }

    pub fn is_empty(&self) -> bool {
        self.typing.is_empty()
    }

    pub fn clear(&mut self) {
        self.typing.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> (ChatId, UserId, UserId) {
        (
            ChatId::new("c").unwrap(),
            UserId::new("a").unwrap(),
            UserId::new("b").unwrap(),
        )
    }

    #[test]
    fn set_reports_only_real_changes() {
        let (chat, a, _) = ids();
        let mut state = TypingState::new();

        assert!(state.set(&chat, &a, true));
        assert!(!state.set(&chat, &a, true));
        assert!(state.set(&chat, &a, false));
        assert!(!state.set(&chat, &a, false));
    }

    #[test]
    fn typing_in_lists_sorted_users() {
        let (chat, a, b) = ids();
        let mut state = TypingState::new();
        state.set(&chat, &b, true);
        state.set(&chat, &a, true);

        assert_eq!(state.typing_in(&chat), vec![a, b]);
    }

    #[test]
    fn stopping_last_typist_removes_chat_entry() {
        let (chat, a, _) = ids();
        let mut state = TypingState::new();
        state.set(&chat, &a, true);
        state.set(&chat, &a, false);
        assert!(state.is_empty());
    }
}
