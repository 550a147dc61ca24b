//! Middleware stack builder for clean composition
//!
//! This module provides a builder for composing the Tower middleware stack,
//! making it easier to maintain and test the middleware pipeline.

use crate::infrastructure::error_reporting::ErrorReporter;
use crate::infrastructure::metrics::MetricsSink;
use crate::proxy::middleware::*;
use axum::{
    middleware::{from_fn, from_fn_with_state},
    Router,
};
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;

/// Builder for composing the gateway middleware stack
pub struct GatewayMiddlewareStack {
    metrics: Arc<dyn MetricsSink>,
    reporter: Arc<dyn ErrorReporter>,
    expose_error_details: bool,
}

impl GatewayMiddlewareStack {
    pub fn new(metrics: Arc<dyn MetricsSink>, reporter: Arc<dyn ErrorReporter>) -> Self {
        Self {
            metrics,
            reporter,
            expose_error_details: false,
        }
    }

    /// Include panic messages in 500 responses
    pub fn with_error_details(mut self, expose: bool) -> Self {
        self.expose_error_details = expose;
        self
    }

    /// Apply the complete middleware stack to a router
    ///
    /// The middleware are applied in the following order (outer to inner):
    /// 1. Request ID generation/propagation
    /// 2. Logging (with request ID)
    /// 3. HTTP metrics per route template
    /// 4. Panic recovery
    pub fn apply_to_router<S>(self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router
            // Apply middleware in reverse order (innermost first in the builder)
            .layer(CatchPanicLayer::custom(PanicResponder::new(
                self.reporter,
                self.expose_error_details,
            )))
            .layer(from_fn_with_state(self.metrics, metrics_middleware))
            .layer(from_fn(logging_middleware))
            .layer(from_fn(request_id_middleware))
    }
}
