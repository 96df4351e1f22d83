pub mod conversation;
pub mod events;
pub mod message;
pub mod presence;
pub mod timestamp;

pub use conversation::{ClearConversationResponse, ConversationListResponse, ConversationSummary, MessageLogResponse};
pub use events::{
    ChatCleared, ChatStreamEvent, ConversationRefresh, DirectedMessage, MessageDeleted,
    MessageEdited,
};
pub use message::{
    Attachment, AttachmentKind, EditMessageRequest, Message, MessageDirection,
    SendMessageRequest, SendMessageResponse,
};
pub use presence::{PresenceDelta, PresenceSnapshot};
pub use timestamp::Timestamp;
