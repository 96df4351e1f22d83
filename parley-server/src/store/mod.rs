//! Durable message storage behind a narrow async trait.
//!
//! Everything the rest of the server knows about persistence goes through
//! [`ConversationStore`]. The store is the single source of truth: no event
//! is pushed for a message the store has not committed, and clients re-read
//! the store whenever they need certainty.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use shared::models::{Attachment, ConversationSummary, Message};

pub mod memory;
pub mod postgres;

pub use memory::MemoryConversationStore;
pub use postgres::PgConversationStore;

pub type SharedStore = Arc<dyn ConversationStore>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// A message the router has validated but the store has not yet committed.
/// The store assigns the id and the commit timestamp.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub content: Option<String>,
    pub attachment: Option<Attachment>,
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Commits a message and returns it as stored, id and timestamp assigned.
    async fn create_message(&self, new: NewMessage) -> Result<Message, StoreError>;

    /// Full log between two identities, oldest first.
    async fn messages_between(&self, a: Uuid, b: Uuid) -> Result<Vec<Message>, StoreError>;

    async fn find_message(&self, id: Uuid) -> Result<Option<Message>, StoreError>;

    /// Replaces the content of an existing message and marks it edited.
    /// Fails with [`StoreError::NotFound`] if the message is gone, which is
    /// how an edit racing a delete resolves.
    async fn update_message_content(&self, id: Uuid, content: &str) -> Result<Message, StoreError>;

    async fn delete_message(&self, id: Uuid) -> Result<(), StoreError>;

    /// Removes every message between two identities; returns how many went.
    async fn delete_conversation(&self, a: Uuid, b: Uuid) -> Result<u64, StoreError>;

    /// One entry per counterpart the identity has exchanged messages with,
    /// most recent activity first.
    async fn conversation_summaries(
        &self,
        identity: Uuid,
    ) -> Result<Vec<ConversationSummary>, StoreError>;

    /// Cheap health probe used by the readiness endpoint.
    async fn ping(&self) -> Result<(), StoreError>;
}
