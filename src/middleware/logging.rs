//! Request/response logging stage.
//!
//! A `TraceLayer` that opens one span per request and logs one concise line
//! per response:
//!
//! ```text
//! INFO request{method=GET path=/api/users/current}: status=200 latency_ms=0.412 "response"
//! ```
//!
//! Server errors are logged at `WARN` so they stand out in development output.

use std::time::Duration;

use axum::http::{Request, Response};
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::trace::{DefaultOnRequest, MakeSpan, OnResponse, TraceLayer};
use tracing::{Span, info, info_span, warn};

/// Span per request carrying method and path.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestSpan;

impl<B> MakeSpan<B> for RequestSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        info_span!(
            "request",
            method = %request.method(),
            path = %request.uri().path(),
        )
    }
}

/// One log line per response.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessLog;

impl<B> OnResponse<B> for AccessLog {
    fn on_response(self, response: &Response<B>, latency: Duration, _span: &Span) {
        let status = response.status().as_u16();
        let latency_ms = format!("{:.3}", latency.as_secs_f64() * 1000.0);

        if response.status().is_server_error() {
            warn!(status, latency_ms = %latency_ms, "response");
        } else {
            info!(status, latency_ms = %latency_ms, "response");
        }
    }
}

/// Layer type of the logging stage.
pub type RequestLogLayer =
    TraceLayer<SharedClassifier<ServerErrorsAsFailures>, RequestSpan, DefaultOnRequest, AccessLog>;

/// Build the request logging layer.
pub fn request_log_layer() -> RequestLogLayer {
    TraceLayer::new_for_http()
        .make_span_with(RequestSpan)
        .on_response(AccessLog)
}
