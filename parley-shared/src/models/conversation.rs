use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{Message, Timestamp};

/// One row of the conversation list: derived by the durable store on demand,
/// never cached authoritatively by the real-time layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct ConversationSummary {
    /// The other participant.
    pub counterpart_id: Uuid,

    /// Preview of the most recent message (content, or attachment name).
    pub last_message_preview: String,

    /// When the most recent message in the pair was committed.
    pub last_activity_at: Timestamp,
}

/// Response body for the conversation-list endpoint, most-recent-first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct ConversationListResponse {
    pub conversations: Vec<ConversationSummary>,
}

/// Response body for a conversation's message log, oldest-first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct MessageLogResponse {
    pub messages: Vec<Message>,
}

/// Response body after clearing a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct ClearConversationResponse {
    /// Number of messages removed.
    pub deleted: u64,
}
