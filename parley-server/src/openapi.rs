use shared::models::{
    Attachment, AttachmentKind, ClearConversationResponse, ConversationListResponse,
    ConversationSummary, EditMessageRequest, Message, MessageLogResponse, SendMessageRequest,
    SendMessageResponse,
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Parley API",
        version = "1.0.0",
        description = "Direct messaging with presence and a live event stream"
    ),
    paths(
        crate::handlers::messages::send_message,
        crate::handlers::messages::edit_message,
        crate::handlers::messages::delete_message,
        crate::handlers::conversations::list_conversations,
        crate::handlers::conversations::conversation_log,
        crate::handlers::conversations::clear_conversation,
    ),
    components(
        schemas(
            Attachment,
            AttachmentKind,
            ClearConversationResponse,
            ConversationListResponse,
            ConversationSummary,
            EditMessageRequest,
            Message,
            MessageLogResponse,
            SendMessageRequest,
            SendMessageResponse,
        )
    ),
    tags(
        (name = "Messages", description = "Message mutation endpoints"),
        (name = "Conversations", description = "Conversation list and log endpoints")
    )
)]
pub struct ApiDoc;
