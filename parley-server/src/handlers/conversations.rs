use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    routing::get,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    app_state::AppState,
    http::error::{ApiError, AppResult},
    middleware::request_context::RequestContext,
    realtime::SharedRouter,
};
use shared::models::{ClearConversationResponse, ConversationListResponse, MessageLogResponse};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/conversations", get(list_conversations))
        .route(
            "/api/conversations/{counterpart_id}",
            axum::routing::delete(clear_conversation),
        )
        .route(
            "/api/conversations/{counterpart_id}/messages",
            get(conversation_log),
        )
}

/// The caller's conversation list, most recent activity first.
#[utoipa::path(
    get,
    path = "/api/conversations",
    tag = "Conversations",
    responses(
        (status = 200, description = "Conversation summaries", body = ConversationListResponse),
        (status = 401, description = "No valid session"),
        (status = 503, description = "Durable store unavailable")
    )
)]
#[instrument(skip(router, context))]
pub async fn list_conversations(
    Extension(router): Extension<SharedRouter>,
    Extension(context): Extension<RequestContext>,
) -> AppResult<Json<ConversationListResponse>> {
    let user_id = require_user(&context)?;
    let conversations = router.summaries(user_id).await?;
    Ok(Json(ConversationListResponse { conversations }))
}

/// Full message log with one counterpart, oldest first. This is the
/// authoritative answer clients re-pull after any push hint.
#[utoipa::path(
    get,
    path = "/api/conversations/{counterpart_id}/messages",
    tag = "Conversations",
    params(("counterpart_id" = Uuid, Path, description = "The other participant")),
    responses(
        (status = 200, description = "Message log", body = MessageLogResponse),
        (status = 401, description = "No valid session"),
        (status = 503, description = "Durable store unavailable")
    )
)]
#[instrument(skip(router, context))]
pub async fn conversation_log(
    Extension(router): Extension<SharedRouter>,
    Extension(context): Extension<RequestContext>,
    Path(counterpart_id): Path<Uuid>,
) -> AppResult<Json<MessageLogResponse>> {
    let user_id = require_user(&context)?;
    let messages = router.conversation_log(user_id, counterpart_id).await?;
    Ok(Json(MessageLogResponse { messages }))
}

/// Wipes the conversation with one counterpart for both participants.
#[utoipa::path(
    delete,
    path = "/api/conversations/{counterpart_id}",
    tag = "Conversations",
    params(("counterpart_id" = Uuid, Path, description = "The other participant")),
    responses(
        (status = 200, description = "Conversation cleared", body = ClearConversationResponse),
        (status = 401, description = "No valid session"),
        (status = 503, description = "Durable store unavailable")
    )
)]
#[instrument(skip(router, context))]
pub async fn clear_conversation(
    Extension(router): Extension<SharedRouter>,
    Extension(context): Extension<RequestContext>,
    Path(counterpart_id): Path<Uuid>,
) -> AppResult<Json<ClearConversationResponse>> {
    let user_id = require_user(&context)?;
    let deleted = router.clear_conversation(user_id, counterpart_id).await?;
    Ok(Json(ClearConversationResponse { deleted }))
}

pub(crate) fn require_user(context: &RequestContext) -> AppResult<Uuid> {
    context
        .user_id
        .ok_or_else(|| ApiError::unauthorized("authentication required"))
}
