//! Error reporting collaborator
//!
//! Failures that lie outside the client's control (upstream outages, broken
//! relays, handler panics) are passed to an [`ErrorReporter`]. The default
//! reporter writes a structured `error!` event.

use std::error::Error as StdError;
use tracing::error;

/// Where and for which request an error was captured
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ErrorContext {
    pub stage: &'static str,
    pub request_id: Option<String>,
    pub method: Option<String>,
    pub path: Option<String>,
    pub target: Option<String>,
}

impl ErrorContext {
    pub fn new(stage: &'static str) -> Self {
        Self {
            stage,
            ..Self::default()
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_request(mut self, method: impl Into<String>, path: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self.path = Some(path.into());
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }
}

/// Receives exceptions worth alerting on
pub trait ErrorReporter: Send + Sync {
    fn capture_exception(&self, error: &(dyn StdError + 'static), context: &ErrorContext);
}

/// Reporter that logs each capture through `tracing`
#[derive(Clone, Debug, Default)]
pub struct TracingErrorReporter;

impl ErrorReporter for TracingErrorReporter {
    fn capture_exception(&self, error: &(dyn StdError + 'static), context: &ErrorContext) {
        error!(
            stage = context.stage,
            request_id = context.request_id.as_deref().unwrap_or("unknown"),
            method = context.method.as_deref(),
            path = context.path.as_deref(),
            target = context.target.as_deref(),
            error = %error,
            cause = %source_chain(error),
            "Captured exception"
        );
    }
}

/// Render the `source()` chain below `error`, innermost last
pub fn source_chain(error: &(dyn StdError + 'static)) -> String {
    let mut causes = Vec::new();
    let mut current = error.source();
    while let Some(cause) = current {
        causes.push(cause.to_string());
        current = cause.source();
    }
    causes.join(": ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[derive(Debug, thiserror::Error)]
    #[error("outer failure")]
    struct Outer(#[source] io::Error);

    #[test]
    fn test_context_builder() {
        let context = ErrorContext::new("proxy")
            .with_request_id("req-1")
            .with_request("GET", "/api/products")
            .with_target("http://backend:3847");

        assert_eq!(context.stage, "proxy");
        assert_eq!(context.request_id.as_deref(), Some("req-1"));
        assert_eq!(context.method.as_deref(), Some("GET"));
        assert_eq!(context.path.as_deref(), Some("/api/products"));
        assert_eq!(context.target.as_deref(), Some("http://backend:3847"));
    }

    #[test]
    fn test_source_chain_lists_causes() {
        let error = Outer(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"));
        assert_eq!(source_chain(&error), "refused");

        let leaf = io::Error::other("leaf");
        assert_eq!(source_chain(&leaf), "");
    }

    #[test]
    fn test_tracing_reporter_accepts_any_error() {
        let reporter = TracingErrorReporter;
        let error = io::Error::other("boom");
        reporter.capture_exception(&error, &ErrorContext::new("test"));
    }
}
