use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use shared::models::{ConversationSummary, Message, Timestamp};

use super::{ConversationStore, NewMessage, StoreError};

/// Volatile store backing the dev and test profiles. Everything is gone on
/// restart; it exists so the server runs without Postgres.
#[derive(Debug, Default)]
pub struct MemoryConversationStore {
    messages: RwLock<Vec<Message>>,
}

impl MemoryConversationStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
    async fn create_message(&self, new: NewMessage) -> Result<Message, StoreError> {
        let message = Message {
            id: Uuid::new_v4(),
            sender_id: new.sender_id,
            receiver_id: new.receiver_id,
            content: new.content,
            attachment: new.attachment,
            sent_at: Timestamp(Utc::now()),
            edited: false,
        };
        self.messages.write().await.push(message.clone());
        Ok(message)
    }

    async fn messages_between(&self, a: Uuid, b: Uuid) -> Result<Vec<Message>, StoreError> {
        let messages = self.messages.read().await;
        Ok(messages
            .iter()
            .filter(|m| {
                (m.sender_id == a && m.receiver_id == b)
                    || (m.sender_id == b && m.receiver_id == a)
            })
            .cloned()
            .collect())
    }

    async fn find_message(&self, id: Uuid) -> Result<Option<Message>, StoreError> {
        let messages = self.messages.read().await;
        Ok(messages.iter().find(|m| m.id == id).cloned())
    }

    async fn update_message_content(&self, id: Uuid, content: &str) -> Result<Message, StoreError> {
        let mut messages = self.messages.write().await;
        match messages.iter_mut().find(|m| m.id == id) {
            Some(message) => {
                message.content = Some(content.to_string());
                message.edited = true;
                Ok(message.clone())
            }
            None => Err(StoreError::NotFound(format!("message {id}"))),
        }
    }

    async fn delete_message(&self, id: Uuid) -> Result<(), StoreError> {
        let mut messages = self.messages.write().await;
        let before = messages.len();
        messages.retain(|m| m.id != id);
        if messages.len() == before {
            return Err(StoreError::NotFound(format!("message {id}")));
        }
        Ok(())
    }

    async fn delete_conversation(&self, a: Uuid, b: Uuid) -> Result<u64, StoreError> {
        let mut messages = self.messages.write().await;
        let before = messages.len();
        messages.retain(|m| {
            !((m.sender_id == a && m.receiver_id == b)
                || (m.sender_id == b && m.receiver_id == a))
        });
        Ok((before - messages.len()) as u64)
    }

    async fn conversation_summaries(
        &self,
        identity: Uuid,
    ) -> Result<Vec<ConversationSummary>, StoreError> {
        let messages = self.messages.read().await;
        let mut latest: HashMap<Uuid, &Message> = HashMap::new();

        for message in messages.iter() {
            let Some(counterpart) = message.counterpart_of(identity) else {
                continue;
            };
            // Same ordering as the Postgres ranking: sent_at, then id.
            let keep = latest.get(&counterpart).is_none_or(|current| {
                (message.sent_at.0, message.id) > (current.sent_at.0, current.id)
            });
            if keep {
                latest.insert(counterpart, message);
            }
        }

        let mut summaries: Vec<ConversationSummary> = latest
            .into_iter()
            .map(|(counterpart_id, message)| ConversationSummary {
                counterpart_id,
                last_message_preview: message.preview(),
                last_activity_at: message.sent_at.clone(),
            })
            .collect();
        summaries.sort_by(|a, b| b.last_activity_at.0.cmp(&a.last_activity_at.0));
        Ok(summaries)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
