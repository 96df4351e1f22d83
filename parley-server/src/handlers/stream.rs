use axum::{
    extract::Extension,
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
};
use futures_util::Stream;
use serde_json::json;
use shared::config::server::Config;
use std::{convert::Infallible, sync::Arc, time::Duration};
use tokio_stream::{StreamExt, wrappers::ReceiverStream};
use tracing::info;
use uuid::Uuid;

use crate::middleware::request_context::RequestContext;
use crate::realtime::SharedHub;

/// Unregisters the connection when the SSE stream is dropped, however it
/// ends: client close, network failure, or server shutdown. Disconnect is
/// idempotent, so racing an explicit kick is fine.
struct DisconnectGuard {
    hub: SharedHub,
    connection_id: Uuid,
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        let hub = Arc::clone(&self.hub);
        let connection_id = self.connection_id;
        tokio::spawn(async move {
            hub.disconnect(connection_id).await;
        });
    }
}

/// The live event stream. One registered connection per request; multiple
/// concurrent streams per identity are expected and each gets every event.
pub async fn sse_handler(
    Extension(config): Extension<Arc<Config>>,
    Extension(hub): Extension<SharedHub>,
    Extension(context): Extension<RequestContext>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, StatusCode> {
    let user_id = context.user_id.ok_or(StatusCode::UNAUTHORIZED)?;

    let (connection_id, receiver) = hub.connect(user_id).await;
    info!(%user_id, %connection_id, "establishing event stream");

    let guard = DisconnectGuard {
        hub: Arc::clone(&hub),
        connection_id,
    };

    let stream = ReceiverStream::new(receiver).map(move |event| {
        // Owning the guard here ties the connection's lifetime to the stream.
        let _held = &guard;

        let data = serde_json::to_string(&event).unwrap_or_else(|err| {
            json!({
                "event": "error",
                "payload": { "message": format!("event serialization failed: {err}") }
            })
            .to_string()
        });

        Ok::<_, Infallible>(Event::default().event(event.name()).data(data))
    });

    let keepalive = KeepAlive::new()
        .interval(Duration::from_secs(config.stream.heartbeat_seconds.max(5)))
        .text("keep-alive");

    Ok(Sse::new(stream).keep_alive(keepalive))
}
