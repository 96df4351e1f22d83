use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{Message, MessageDirection, PresenceDelta, PresenceSnapshot};

/// A message copy labeled with the recipient's side of the conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct DirectedMessage {
    pub message: Message,
    pub direction: MessageDirection,
}

/// Partial update after a successful edit; clients that do not hold the
/// message locally can ignore it and rely on the refresh signal instead.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct MessageEdited {
    pub message_id: Uuid,
    pub new_content: String,
}

/// A message was removed from the conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct MessageDeleted {
    pub message_id: Uuid,
}

/// The whole conversation with `initiator_id` was wiped; delivered only to
/// the participant that did not initiate the wipe.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct ChatCleared {
    pub initiator_id: Uuid,
}

/// Hint that the conversation list for the recipient changed. Pushed after
/// every committed mutation; clients re-pull the summary list rather than
/// patching it from this event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct ConversationRefresh {
    /// The counterpart whose pairing with the recipient changed.
    pub counterpart_id: Uuid,
}

/// Everything the server pushes over a live connection.
///
/// Push events are hints; the durable store is truth. Every variant is safe
/// to apply redundantly or to miss entirely, because clients reconcile
/// against the store on every event and on every reconnect.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum ChatStreamEvent {
    /// Sent once, immediately after the connection is registered.
    PresenceSnapshot(PresenceSnapshot),
    /// Broadcast to every connection; clients filter to their own contacts.
    PresenceDelta(PresenceDelta),
    /// Echo of a committed send to the sender's own connections.
    MessageSent(DirectedMessage),
    /// Delivery of a committed send to the receiver's connections.
    ReceiveMessage(DirectedMessage),
    MessageEdited(MessageEdited),
    MessageDeleted(MessageDeleted),
    ChatCleared(ChatCleared),
    ConversationRefresh(ConversationRefresh),
}

impl ChatStreamEvent {
    /// Stable wire name, used as the SSE event field.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ChatStreamEvent::PresenceSnapshot(_) => "presence_snapshot",
            ChatStreamEvent::PresenceDelta(_) => "presence_delta",
            ChatStreamEvent::MessageSent(_) => "message_sent",
            ChatStreamEvent::ReceiveMessage(_) => "receive_message",
            ChatStreamEvent::MessageEdited(_) => "message_edited",
            ChatStreamEvent::MessageDeleted(_) => "message_deleted",
            ChatStreamEvent::ChatCleared(_) => "chat_cleared",
            ChatStreamEvent::ConversationRefresh(_) => "conversation_refresh",
        }
    }
}
