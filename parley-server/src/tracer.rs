use axum::{
    body::Body,
    http::{Request, Response},
};
use std::time::Duration;
use tower_http::classify::{ServerErrorsAsFailures, ServerErrorsFailureClass, SharedClassifier};
use tower_http::trace::{
    DefaultOnBodyChunk, DefaultOnEos, DefaultOnRequest, MakeSpan, OnResponse, TraceLayer,
};
use tracing::{Span, error, info};

use crate::middleware::request_context::RequestContext;

type HttpTraceLayer = TraceLayer<
    SharedClassifier<ServerErrorsAsFailures>,
    RequestSpan,
    DefaultOnRequest,
    ResponseRecorder,
    DefaultOnBodyChunk,
    DefaultOnEos,
    fn(ServerErrorsFailureClass, Duration, &Span),
>;

/// Opens one span per request, keyed by the id the context middleware
/// assigned, so handler and fan-out log lines share a correlation key.
#[derive(Clone, Default)]
pub(crate) struct RequestSpan;

impl<B> MakeSpan<B> for RequestSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        let request_id = request
            .extensions()
            .get::<RequestContext>()
            .map(|context| context.request_id.clone())
            .unwrap_or_default();

        tracing::info_span!(
            "request",
            method = %request.method(),
            path = %request.uri().path(),
            request_id = %request_id,
            status = tracing::field::Empty,
        )
    }
}

/// Fills the span's `status` field once the response exists and logs the
/// outcome with its latency.
#[derive(Clone, Default)]
pub(crate) struct ResponseRecorder;

impl<B> OnResponse<B> for ResponseRecorder {
    fn on_response(self, response: &Response<B>, latency: Duration, span: &Span) {
        let status = response.status().as_u16();
        span.record("status", status);
        span.in_scope(|| {
            info!(
                status,
                latency_ms = latency.as_millis() as u64,
                "request completed"
            );
        });
    }
}

fn log_failure(failure: ServerErrorsFailureClass, latency: Duration, span: &Span) {
    span.in_scope(|| {
        error!(
            failure = %failure,
            latency_ms = latency.as_millis() as u64,
            "request failed"
        );
    });
}

pub fn create_trace_layer() -> HttpTraceLayer {
    TraceLayer::new_for_http()
        .make_span_with(RequestSpan)
        .on_response(ResponseRecorder)
        .on_failure(log_failure as fn(ServerErrorsFailureClass, Duration, &Span))
}
