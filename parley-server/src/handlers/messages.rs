use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{post, put},
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    app_state::AppState, http::error::AppResult,
    middleware::request_context::RequestContext, realtime::SharedRouter,
};
use shared::models::{EditMessageRequest, SendMessageRequest, SendMessageResponse};

use super::conversations::require_user;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/messages", post(send_message))
        .route(
            "/api/messages/{message_id}",
            put(edit_message).delete(delete_message),
        )
}

/// Sends a direct message. The response carries the message exactly as the
/// store committed it; the same message also goes out over the push stream.
#[utoipa::path(
    post,
    path = "/api/messages",
    tag = "Messages",
    request_body = SendMessageRequest,
    responses(
        (status = 201, description = "Message committed", body = SendMessageResponse),
        (status = 400, description = "Invalid message"),
        (status = 401, description = "No valid session"),
        (status = 503, description = "Durable store unavailable")
    )
)]
#[instrument(skip(router, context, payload))]
pub async fn send_message(
    Extension(router): Extension<SharedRouter>,
    Extension(context): Extension<RequestContext>,
    Json(payload): Json<SendMessageRequest>,
) -> AppResult<impl IntoResponse> {
    let user_id = require_user(&context)?;
    let message = router.send(user_id, payload).await?;
    Ok((StatusCode::CREATED, Json(SendMessageResponse { message })))
}

/// Replaces a message's text. Sender only.
#[utoipa::path(
    put,
    path = "/api/messages/{message_id}",
    tag = "Messages",
    params(("message_id" = Uuid, Path, description = "Message to edit")),
    request_body = EditMessageRequest,
    responses(
        (status = 200, description = "Message updated", body = SendMessageResponse),
        (status = 400, description = "Empty content, or the message is an attachment"),
        (status = 401, description = "No valid session"),
        (status = 403, description = "Caller is not the sender"),
        (status = 404, description = "Message no longer exists"),
        (status = 503, description = "Durable store unavailable")
    )
)]
#[instrument(skip(router, context, payload))]
pub async fn edit_message(
    Extension(router): Extension<SharedRouter>,
    Extension(context): Extension<RequestContext>,
    Path(message_id): Path<Uuid>,
    Json(payload): Json<EditMessageRequest>,
) -> AppResult<Json<SendMessageResponse>> {
    let user_id = require_user(&context)?;
    let message = router.edit(user_id, message_id, &payload.content).await?;
    Ok(Json(SendMessageResponse { message }))
}

/// Removes a message. Sender only.
#[utoipa::path(
    delete,
    path = "/api/messages/{message_id}",
    tag = "Messages",
    params(("message_id" = Uuid, Path, description = "Message to delete")),
    responses(
        (status = 204, description = "Message removed"),
        (status = 401, description = "No valid session"),
        (status = 403, description = "Caller is not the sender"),
        (status = 404, description = "Message no longer exists"),
        (status = 503, description = "Durable store unavailable")
    )
)]
#[instrument(skip(router, context))]
pub async fn delete_message(
    Extension(router): Extension<SharedRouter>,
    Extension(context): Extension<RequestContext>,
    Path(message_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let user_id = require_user(&context)?;
    router.delete(user_id, message_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
