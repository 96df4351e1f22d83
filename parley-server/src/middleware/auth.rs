use axum::{
    body::Body,
    extract::Request,
    http::{self, header},
    middleware::Next,
    response::Response,
};
use cookie::Cookie;
use http::StatusCode;
use shared::config::server::Config;
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::middleware::request_context::RequestContext;

/// Resolves the session cookie to an identity before any protected handler
/// or stream registration runs. No cookie, no identity, no connection.
#[instrument(skip(req, next))]
pub async fn auth_middleware(mut req: Request<Body>, next: Next) -> Result<Response, StatusCode> {
    let config = req
        .extensions()
        .get::<Arc<Config>>()
        .cloned()
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;

    let session_cookie_name = &config.session.session_cookie_name;
    let session_id = extract_session_cookie(req.headers(), session_cookie_name)
        .ok_or(StatusCode::UNAUTHORIZED)?;

    // Session tokens are opaque; the identity is a stable derivation of the
    // token so the same session always maps to the same user.
    let user_id = Uuid::new_v5(&Uuid::NAMESPACE_URL, session_id.as_bytes());

    if let Some(context) = req.extensions_mut().get_mut::<RequestContext>() {
        context.user_id = Some(user_id);
    } else {
        req.extensions_mut().insert(RequestContext {
            request_id: String::new(),
            user_id: Some(user_id),
        });
    }

    debug!(%user_id, path = %req.uri().path(), "authenticated request");
    Ok(next.run(req).await)
}

fn extract_session_cookie(headers: &http::HeaderMap, name: &str) -> Option<String> {
    let value = headers.get(header::COOKIE)?.to_str().ok()?;
    Cookie::split_parse(value)
        .flatten()
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue};

    #[test]
    fn finds_the_named_cookie_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; parley_session=abc123; lang=en"),
        );

        let session = extract_session_cookie(&headers, "parley_session");
        assert_eq!(session.as_deref(), Some("abc123"));
        assert!(extract_session_cookie(&headers, "other_session").is_none());
    }

    #[test]
    fn same_session_derives_the_same_identity() {
        let a = Uuid::new_v5(&Uuid::NAMESPACE_URL, b"session-token");
        let b = Uuid::new_v5(&Uuid::NAMESPACE_URL, b"session-token");
        let c = Uuid::new_v5(&Uuid::NAMESPACE_URL, b"different-token");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
