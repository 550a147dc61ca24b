//! Result of one proxied exchange, as consumed by the response writer

use crate::proxy::types::{ProxyError, ProxyResult, UpstreamResponse};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::error_response::ErrorResponseExt;

/// Tagged result of forwarding one request
#[derive(Debug)]
pub enum ProxyOutcome {
    /// Upstream answered with a status below 400
    Forwarded(UpstreamResponse),
    /// Upstream answered with a 4xx or 5xx status; relayed verbatim
    UpstreamError(UpstreamResponse),
    /// No usable upstream response
    Failed(ProxyError),
}

impl ProxyOutcome {
    /// Status the client will see
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyOutcome::Forwarded(response) | ProxyOutcome::UpstreamError(response) => {
                response.status
            }
            ProxyOutcome::Failed(error) => error.status_code(),
        }
    }

    /// Stable label for logs
    pub fn label(&self) -> &'static str {
        match self {
            ProxyOutcome::Forwarded(_) => "forwarded",
            ProxyOutcome::UpstreamError(_) => "upstream_error",
            ProxyOutcome::Failed(error) => error.kind(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, ProxyOutcome::Failed(_))
    }
}

impl From<ProxyResult<UpstreamResponse>> for ProxyOutcome {
    fn from(result: ProxyResult<UpstreamResponse>) -> Self {
        match result {
            Ok(response) if response.status.as_u16() >= 400 => {
                ProxyOutcome::UpstreamError(response)
            }
            Ok(response) => ProxyOutcome::Forwarded(response),
            Err(error) => ProxyOutcome::Failed(error),
        }
    }
}

impl IntoResponse for UpstreamResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(self.body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

impl IntoResponse for ProxyOutcome {
    fn into_response(self) -> Response {
        match self {
            ProxyOutcome::Forwarded(response) | ProxyOutcome::UpstreamError(response) => {
                response.into_response()
            }
            ProxyOutcome::Failed(error) => error.into_response(),
        }
    }
}
