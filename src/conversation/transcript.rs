//! Ordered conversation transcript and its persisted form

use super::message::Message;
use crate::Result;
use crate::db::KeyValueStore;

/// The messages shown to the user, plus the typing placeholder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    messages: Vec<Message>,
    typing: bool,
    greeting: Message,
}

impl Transcript {
    /// A transcript holding only the greeting
    #[must_use]
    pub fn new(greeting: Message) -> Self {
        Self {
            messages: vec![greeting.clone()],
            typing: false,
            greeting,
        }
    }

    /// Load the stored transcript, keeping the greeting if none parses
    ///
    /// A stored empty list is honored and yields an empty transcript.
    #[must_use]
    pub fn load(store: &dyn KeyValueStore, key: &str, greeting: Message) -> Self {
        let mut transcript = Self::new(greeting);

        let stored = match store.get(key) {
            Ok(Some(stored)) => stored,
            Ok(None) => return transcript,
            Err(e) => {
                tracing::warn!(error = %e, key, "failed to read stored transcript");
                return transcript;
            }
        };

        match serde_json::from_str::<Vec<Message>>(&stored) {
            Ok(messages) => {
                tracing::debug!(count = messages.len(), "restored transcript");
                transcript.messages = messages;
            }
            Err(e) => {
                tracing::warn!(error = %e, key, "stored transcript is corrupt, starting fresh");
            }
        }

        transcript
    }

    /// Persist the messages; the typing placeholder is never stored
    ///
    /// # Errors
    ///
    /// Returns error if serialization or the store write fails
    pub fn save(&self, store: &dyn KeyValueStore, key: &str) -> Result<()> {
        let json = serde_json::to_string(&self.messages)?;
        store.set(key, &json)
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Drop everything and start over with the greeting
    pub fn reset(&mut self) {
        self.messages = vec![self.greeting.clone()];
        self.typing = false;
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    #[must_use]
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    #[must_use]
    pub const fn greeting(&self) -> &Message {
        &self.greeting
    }

    /// Whether the typing placeholder is showing
    #[must_use]
    pub const fn is_typing(&self) -> bool {
        self.typing
    }

    pub fn set_typing(&mut self, typing: bool) {
        self.typing = typing;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;

    const KEY: &str = "transcript";

    fn greeting() -> Message {
        Message::bot("Hello!")
    }

    #[test]
    fn starts_with_greeting() {
        let transcript = Transcript::new(greeting());
        assert_eq!(transcript.messages(), &[greeting()]);
        assert!(!transcript.is_typing());
    }

    #[test]
    fn save_then_load_preserves_order_without_typing() {
        let store = MemoryStore::default();
        let mut transcript = Transcript::new(greeting());
        transcript.push(Message::user("one"));
        transcript.push(Message::bot("two"));
        transcript.push(Message::user("three"));
        transcript.set_typing(true);
        transcript.save(&store, KEY).unwrap();

        let stored = store.get(KEY).unwrap().unwrap();
        assert!(!stored.contains("typing"));

        let restored = Transcript::load(&store, KEY, greeting());
        assert_eq!(restored.messages(), transcript.messages());
        assert!(!restored.is_typing());
    }

    #[test]
    fn corrupt_storage_keeps_greeting() {
        let store = MemoryStore::default();
        store.set(KEY, "{not json").unwrap();

        let transcript = Transcript::load(&store, KEY, greeting());
        assert_eq!(transcript.messages(), &[greeting()]);
    }

    #[test]
    fn stored_empty_list_replaces_greeting() {
        let store = MemoryStore::default();
        store.set(KEY, "[]").unwrap();

        let transcript = Transcript::load(&store, KEY, greeting());
        assert!(transcript.is_empty());
    }

    #[test]
    fn reset_returns_to_greeting() {
        let mut transcript = Transcript::new(greeting());
        transcript.push(Message::user("hi"));
        transcript.set_typing(true);

        transcript.reset();

        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript.last(), Some(&greeting()));
        assert!(!transcript.is_typing());
    }
}
