//! Middleware implementations for the gateway

use crate::infrastructure::error_reporting::{ErrorContext, ErrorReporter};
use crate::infrastructure::log_messages::request_processing;
use crate::infrastructure::metrics::{names, MetricsSink};
use crate::proxy::error_response::ErrorResponse;
use crate::proxy::headers::X_REQUEST_ID;
use crate::proxy::types::RequestId;
use axum::{
    body::Body,
    extract::{MatchedPath, Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use std::any::Any;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tower_http::catch_panic::ResponseForPanic;
use tracing::{error, info};

/// Route label for requests no route matched
pub const UNMATCHED_ROUTE: &str = "unmatched";

/// Stage name used when reporting handler panics
pub const STAGE_PANIC: &str = "panic";

/// Request ID middleware - ensures every request has an ID for correlation
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = RequestId::from_headers(request.headers());

    let Some(header_value) = request_id.to_header_value() else {
        return next.run(request).await;
    };

    request
        .headers_mut()
        .insert(X_REQUEST_ID, header_value.clone());

    let mut response = next.run(request).await;
    response.headers_mut().insert(X_REQUEST_ID, header_value);

    response
}

/// Logging middleware - logs request/response details with timing
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();

    // Extract request details before passing ownership
    let method = request.method().clone();
    let uri = request.uri().clone();
    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    info!(
        request_id = request_id,
        method = %method,
        path = %uri.path(),
        "{}",
        request_processing::REQUEST_RECEIVED
    );

    let response = next.run(request).await;
    let duration = start.elapsed();

    info!(
        request_id = request_id,
        method = %method,
        path = %uri.path(),
        status = response.status().as_u16(),
        duration_ms = duration.as_millis() as u64,
        "{}",
        request_processing::REQUEST_COMPLETED
    );

    response
}

/// Metrics middleware - counts requests and observes their duration per route template
pub async fn metrics_middleware(
    State(metrics): State<Arc<dyn MetricsSink>>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_ROUTE.to_string());

    let response = next.run(request).await;

    let status = response.status().as_u16().to_string();
    let labels = [
        (names::LABEL_METHOD, method.as_str()),
        (names::LABEL_ROUTE, route.as_str()),
        (names::LABEL_STATUS, status.as_str()),
    ];
    metrics.increment_counter(names::HTTP_REQUESTS_TOTAL, &labels);
    metrics.observe_histogram(
        names::HTTP_REQUEST_DURATION_SECONDS,
        &labels,
        start.elapsed().as_secs_f64(),
    );

    response
}

/// A handler panicked while serving a request
#[derive(Error, Debug)]
#[error("Handler panicked: {0}")]
pub struct HandlerPanic(pub String);

impl HandlerPanic {
    pub fn from_payload(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(message) = payload.downcast_ref::<&str>() {
            (*message).to_string()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self(message)
    }
}

/// Turns a caught panic into a logged, reported 500 response
#[derive(Clone)]
pub struct PanicResponder {
    reporter: Arc<dyn ErrorReporter>,
    expose_error_details: bool,
}

impl PanicResponder {
    pub fn new(reporter: Arc<dyn ErrorReporter>, expose_error_details: bool) -> Self {
        Self {
            reporter,
            expose_error_details,
        }
    }
}

impl ResponseForPanic for PanicResponder {
    type ResponseBody = Body;

    fn response_for_panic(&mut self, err: Box<dyn Any + Send + 'static>) -> Response<Body> {
        let panic = HandlerPanic::from_payload(err.as_ref());

        error!(
            error = %panic,
            "{}",
            request_processing::HANDLER_PANICKED
        );
        self.reporter
            .capture_exception(&panic, &ErrorContext::new(STAGE_PANIC));

        let detail = self.expose_error_details.then(|| panic.0.clone());
        ErrorResponse::internal(detail).into_response_with_status(StatusCode::INTERNAL_SERVER_ERROR)
    }
}
