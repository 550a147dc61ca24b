//! Unified error response handling for the gateway
//!
//! Every synthesized error is a JSON object with an `error` field and, for
//! most failures, a human-readable `message`.

use crate::proxy::types::ProxyError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Error texts returned to clients
pub mod messages {
    pub const UNAVAILABLE_ERROR: &str = "Backend service unavailable";
    pub const UNAVAILABLE_MESSAGE: &str =
        "The backend service is currently unavailable. Please try again later.";
    pub const TIMEOUT_ERROR: &str = "Backend service timeout";
    pub const TIMEOUT_MESSAGE: &str =
        "The backend service did not respond in time. Please try again later.";
    pub const BAD_GATEWAY_ERROR: &str = "bad gateway";
    pub const PAYLOAD_TOO_LARGE_ERROR: &str = "Payload too large";
    pub const BAD_REQUEST_ERROR: &str = "Bad request";
    pub const INTERNAL_ERROR: &str = "Internal server error";
    pub const INTERNAL_MESSAGE: &str = "An error occurred";
    pub const NOT_FOUND_ERROR: &str = "Not found";
}

/// Standard error response format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Convert to an HTTP response with a JSON body
    pub fn into_response_with_status(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }

    /// 500 for an unexpected handler failure; `detail` is shown only when exposed
    pub fn internal(detail: Option<String>) -> Self {
        Self::new(messages::INTERNAL_ERROR)
            .with_message(detail.unwrap_or_else(|| messages::INTERNAL_MESSAGE.to_string()))
    }

    pub fn not_found(path: &str) -> Self {
        Self::new(messages::NOT_FOUND_ERROR).with_message(format!("No route for {path}"))
    }
}

/// Extension trait for consistent error formatting
pub trait ErrorResponseExt {
    /// Convert to standardized error response
    fn to_error_response(&self) -> ErrorResponse;

    /// Get the appropriate HTTP status code
    fn status_code(&self) -> StatusCode;
}

impl ErrorResponseExt for ProxyError {
    fn to_error_response(&self) -> ErrorResponse {
        use ProxyError::*;

        match self {
            UpstreamUnavailable { .. } => ErrorResponse::new(messages::UNAVAILABLE_ERROR)
                .with_message(messages::UNAVAILABLE_MESSAGE),
            UpstreamTimeout { .. } => {
                ErrorResponse::new(messages::TIMEOUT_ERROR).with_message(messages::TIMEOUT_MESSAGE)
            }
            Transport { .. } | ResponseAlreadyStarted { .. } => {
                ErrorResponse::new(messages::BAD_GATEWAY_ERROR)
            }
            ResponseTooLarge { limit } => ErrorResponse::new(messages::BAD_GATEWAY_ERROR)
                .with_message(format!("Upstream response exceeds {limit} bytes")),
            RequestTooLarge { limit } => ErrorResponse::new(messages::PAYLOAD_TOO_LARGE_ERROR)
                .with_message(format!("Request body exceeds {limit} bytes")),
            InvalidRequestBody(reason) => {
                ErrorResponse::new(messages::BAD_REQUEST_ERROR).with_message(reason.clone())
            }
        }
    }

    fn status_code(&self) -> StatusCode {
        use ProxyError::*;

        match self {
            UpstreamUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Transport { .. } | ResponseTooLarge { .. } | ResponseAlreadyStarted { .. } => {
                StatusCode::BAD_GATEWAY
            }
            RequestTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
        }
    }
}

/// Error conversion for Axum responses using standardized format
impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        self.to_error_response().into_response_with_status(status)
    }
}
