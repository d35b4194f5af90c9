//! Append-only conversation history.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::message::ChatMessage;

/// Ordered conversation history.
///
/// Only the translator, the accumulator and the run driver append to it.
/// Callers fanning one history out to several providers must clone it per
/// provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Conversation {
    id: String,
    messages: Vec<ChatMessage>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    pub fn new() -> Self {
        Self::with_id(format!("conv_{}", Uuid::new_v4().simple()))
    }

    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            messages: Vec::new(),
        }
    }

    /// Builder: seed the history with existing messages.
    pub fn with_messages(mut self, messages: impl IntoIterator<Item = ChatMessage>) -> Self {
        self.messages.extend(messages);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub(crate) fn last_mut(&mut self) -> Option<&mut ChatMessage> {
        self.messages.last_mut()
    }

    /// Most recent message with `id`.
    pub(crate) fn message_mut(&mut self, id: &str) -> Option<&mut ChatMessage> {
        self.messages.iter_mut().rev().find(|message| message.id() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter()
    }

    /// Insert `messages` ahead of the existing history.
    pub(crate) fn prepend(&mut self, messages: Vec<ChatMessage>) {
        self.messages.splice(0..0, messages);
    }

    /// Remove previously prepended messages by id. Returns how many were removed.
    pub(crate) fn remove_prepended(&mut self, ids: &[String]) -> usize {
        let before = self.messages.len();
        self.messages
            .retain(|message| !ids.iter().any(|id| id == message.id()));
        before - self.messages.len()
    }
}

impl<'a> IntoIterator for &'a Conversation {
    type Item = &'a ChatMessage;
    type IntoIter = std::slice::Iter<'a, ChatMessage>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepend_and_remove_restore_history() {
        let mut conversation = Conversation::with_id("c1").with_messages([ChatMessage::user("hi")]);
        let instructions = ChatMessage::system("be terse");
        let id = instructions.id().to_string();

        conversation.prepend(vec![instructions]);
        assert_eq!(conversation.len(), 2);
        assert_eq!(conversation.messages()[0].id(), id);

        assert_eq!(conversation.remove_prepended(&[id]), 1);
        assert_eq!(conversation.len(), 1);
        assert_eq!(conversation.messages()[0].text(), "hi");
    }

    #[test]
    fn fresh_conversations_get_distinct_ids() {
        assert_ne!(Conversation::new().id(), Conversation::new().id());
    }
}
