use uuid::Uuid;

use super::LogMutation;
use crate::models::Message;

/// Local, ordered copy of one conversation's messages.
///
/// Mutations are idempotent: appending a message whose id is already present
/// is a no-op, and editing or removing an unknown id does nothing. That makes
/// it safe to apply the same push event twice, or to apply events that raced
/// with an authoritative re-pull.
#[derive(Debug, Default)]
pub struct MessageLog {
    messages: Vec<Message>,
}

impl MessageLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
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
    pub fn contains(&self, message_id: Uuid) -> bool {
        self.messages.iter().any(|m| m.id == message_id)
    }

    /// Replaces the whole log with an authoritative answer from the store.
    pub fn replace_all(&mut self, messages: Vec<Message>) {
        self.messages = messages;
    }

    /// Applies one mutation; returns whether the log changed.
    pub fn apply(&mut self, mutation: LogMutation) -> bool {
        match mutation {
            LogMutation::Append(message) => {
                if self.contains(message.id) {
                    return false;
                }
                self.messages.push(message);
                true
            }
            LogMutation::Edit {
                message_id,
                new_content,
            } => match self.messages.iter_mut().find(|m| m.id == message_id) {
                Some(message) => {
                    message.content = Some(new_content);
                    message.edited = true;
                    true
                }
                None => false,
            },
            LogMutation::Remove { message_id } => {
                let before = self.messages.len();
                self.messages.retain(|m| m.id != message_id);
                self.messages.len() != before
            }
            LogMutation::Clear => {
                if self.messages.is_empty() {
                    return false;
                }
                self.messages.clear();
                true
            }
        }
    }
}
