//! Scoped standing instructions.

use std::ops::{Deref, DerefMut};

use crate::config::InstructionRole;
use crate::types::Conversation;

/// Prepends agent instructions to a conversation for as long as it lives.
///
/// Dropping the scope removes exactly the messages it inserted, whichever way
/// the run ends (completion, error, cancellation or the caller dropping the
/// update stream).
#[derive(Debug)]
pub struct InstructionScope<'a> {
    conversation: &'a mut Conversation,
    inserted: Vec<String>,
}

impl<'a> InstructionScope<'a> {
    pub fn enter(
        conversation: &'a mut Conversation,
        instructions: &[String],
        role: InstructionRole,
    ) -> Self {
        let messages: Vec<_> = instructions
            .iter()
            .filter(|text| !text.trim().is_empty())
            .map(|text| role.message(text))
            .collect();
        let inserted = messages.iter().map(|m| m.id().to_string()).collect();
        if !messages.is_empty() {
            conversation.prepend(messages);
        }
        Self {
            conversation,
            inserted,
        }
    }

    /// Number of instruction messages currently prepended.
    pub fn inserted(&self) -> usize {
        self.inserted.len()
    }
}

impl Deref for InstructionScope<'_> {
    type Target = Conversation;

    fn deref(&self) -> &Conversation {
        self.conversation
    }
}

impl DerefMut for InstructionScope<'_> {
    fn deref_mut(&mut self) -> &mut Conversation {
        self.conversation
    }
}

impl Drop for InstructionScope<'_> {
    fn drop(&mut self) {
        if self.inserted.is_empty() {
            return;
        }
        let removed = self.conversation.remove_prepended(&self.inserted);
        tracing::debug!(removed, "removed standing instructions");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChatMessage, Role};

    #[test]
    fn instructions_are_visible_inside_the_scope_only() {
        let mut conversation = Conversation::new().with_messages([ChatMessage::user("hi")]);
        {
            let mut scope = InstructionScope::enter(
                &mut conversation,
                &["be terse".to_string(), "  ".to_string()],
                InstructionRole::Developer,
            );
            assert_eq!(scope.inserted(), 1);
            assert_eq!(scope.messages()[0].role(), Role::Developer);
            scope.push(ChatMessage::agent("a1", Vec::new(), None));
        }
        let roles: Vec<_> = conversation.iter().map(ChatMessage::role).collect();
        assert_eq!(roles, vec![Role::User, Role::Agent]);
    }
}
