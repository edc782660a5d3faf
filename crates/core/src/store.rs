//! The chat store: every conversation of one session.

use crate::chat::Chat;

/// Owns all [`Chat`]s of a session and tracks which one is selected.
///
/// The store is an explicit object constructed with the session and
/// passed by reference to its callers; there is no process-wide state.
/// Chats are independent of each other, so operations on one never
/// touch another.
#[derive(Debug, Default)]
pub struct ChatStore {
    chats: Vec<Chat>,
    current: Option<String>,
}

impl ChatStore {
    /// Creates an empty store.
    #[inline]
    pub fn new() -> Self {
        Default::default()
    }

    /// Returns the number of chats.
    #[inline]
    pub fn len(&self) -> usize {
        self.chats.len()
    }

    /// Returns whether the store holds no chats.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chats.is_empty()
    }

    /// Iterates over the chats, newest first.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Chat> {
        self.chats.iter()
    }

    /// Returns the chat with the given id.
    pub fn get(&self, chat_id: &str) -> Option<&Chat> {
        self.chats.iter().find(|chat| chat.id() == chat_id)
    }

    /// Returns the chat with the given id mutably.
    pub fn get_mut(&mut self, chat_id: &str) -> Option<&mut Chat> {
        self.chats.iter_mut().find(|chat| chat.id() == chat_id)
    }

    /// Inserts a chat at the front (newest position).
    pub fn push_front(&mut self, chat: Chat) {
        self.chats.insert(0, chat);
    }

    /// Replaces every chat and selects the first of the new set.
    pub fn replace_all(&mut self, chats: Vec<Chat>) {
        self.current = chats.first().map(|chat| chat.id().to_owned());
        self.chats = chats;
    }

    /// Removes a chat. When it was the selected one, selection moves to
    /// the first remaining chat.
    pub fn remove(&mut self, chat_id: &str) -> Option<Chat> {
        let index = self.chats.iter().position(|chat| chat.id() == chat_id)?;
        let chat = self.chats.remove(index);
        if self.current.as_deref() == Some(chat_id) {
            self.current = self.chats.first().map(|chat| chat.id().to_owned());
        }
        Some(chat)
    }

    /// Selects a chat.
    ///
    /// Panics when the id is unknown; selection of a nonexistent chat
    /// is a caller bug.
    pub fn set_current(&mut self, chat_id: &str) {
        assert!(
            self.get(chat_id).is_some(),
            "chat {chat_id} is not in the store"
        );
        self.current = Some(chat_id.to_owned());
    }

    /// Returns the id of the selected chat, if any.
    #[inline]
    pub fn current_id(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Returns the selected chat, if any.
    pub fn current_chat(&self) -> Option<&Chat> {
        self.get(self.current.as_deref()?)
    }

    /// Returns the selected chat mutably, if any.
    pub fn current_chat_mut(&mut self) -> Option<&mut Chat> {
        let current = self.current.clone()?;
        self.get_mut(&current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removing_the_current_chat_moves_selection() {
        let mut store = ChatStore::new();
        store.push_front(Chat::new("a", "first"));
        store.push_front(Chat::new("b", "second"));
        store.set_current("b");

        store.remove("b");
        assert_eq!(store.current_id(), Some("a"));

        store.remove("a");
        assert_eq!(store.current_id(), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_removing_another_chat_keeps_selection() {
        let mut store = ChatStore::new();
        store.push_front(Chat::new("a", "first"));
        store.push_front(Chat::new("b", "second"));
        store.set_current("b");

        store.remove("a");
        assert_eq!(store.current_id(), Some("b"));
    }

    #[test]
    fn test_replace_all_selects_the_first_chat() {
        let mut store = ChatStore::new();
        store.replace_all(vec![Chat::new("x", "one"), Chat::new("y", "two")]);
        assert_eq!(store.current_id(), Some("x"));
        assert_eq!(store.len(), 2);
    }

    #[test]
    #[should_panic(expected = "not in the store")]
    fn test_selecting_an_unknown_chat_panics() {
        let mut store = ChatStore::new();
        store.set_current("ghost");
    }
}
