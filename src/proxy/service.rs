//! Main gateway service implementation
//!
//! The `GatewayService` is the main entry point for the gateway. It wires the
//! upstream forwarder, the backend health probe and the metrics sink into an
//! axum router wrapped in the middleware stack.
//!
//! ## Service Lifecycle
//!
//! ```rust,ignore
//! use storefront_gateway::proxy::{GatewayCollaborators, GatewayService};
//!
//! // 1. Create service with configuration and collaborators
//! let service = GatewayService::new(config, collaborators)?;
//!
//! // 2. Convert to Axum router
//! let router = service.into_router();
//!
//! // 3. Serve with Axum, recording peer addresses for X-Forwarded-For
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:5921").await?;
//! axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>()).await?;
//! ```

use crate::infrastructure::error_reporting::ErrorReporter;
use crate::infrastructure::log_messages;
use crate::infrastructure::metrics::MetricsSink;
use crate::proxy::error_response::ErrorResponse;
use crate::proxy::forwarder::{build_http_client, HttpClient, UpstreamForwarder};
use crate::proxy::headers::{paths, CONTENT_TYPE};
use crate::proxy::health::{HealthChecker, HealthReport, LivenessReport, ReadinessReport};
use crate::proxy::middleware_stack::GatewayMiddlewareStack;
use crate::proxy::outcome::ProxyOutcome;
use crate::proxy::types::*;
use axum::{
    extract::{Request, State},
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::error;

/// Collaborators injected into the gateway
#[derive(Clone)]
pub struct GatewayCollaborators {
    pub metrics: Arc<dyn MetricsSink>,
    pub reporter: Arc<dyn ErrorReporter>,
}

/// Main gateway service
pub struct GatewayService {
    forwarder: UpstreamForwarder,
    health: HealthChecker,
    metrics: Arc<dyn MetricsSink>,
    reporter: Arc<dyn ErrorReporter>,
    service_name: String,
    expose_error_details: bool,
    started_at: Instant,
}

impl GatewayService {
    /// Create a new gateway service with its own HTTP client
    pub fn new(config: GatewayConfig, collaborators: GatewayCollaborators) -> ProxyResult<Self> {
        Self::with_client(config, collaborators, build_http_client())
    }

    /// Create a gateway service sharing an existing HTTP client
    pub fn with_client(
        config: GatewayConfig,
        collaborators: GatewayCollaborators,
        client: HttpClient,
    ) -> ProxyResult<Self> {
        let health = HealthChecker::new(client.clone(), &config.proxy.upstream_url, &config.health)?;
        let forwarder = UpstreamForwarder::new(
            config.proxy,
            client,
            collaborators.metrics.clone(),
            collaborators.reporter.clone(),
        );

        Ok(Self {
            forwarder,
            health,
            metrics: collaborators.metrics,
            reporter: collaborators.reporter,
            service_name: config.service_name,
            expose_error_details: config.expose_error_details,
            started_at: Instant::now(),
        })
    }

    pub fn proxy_config(&self) -> &ProxyConfig {
        self.forwarder.config()
    }

    /// Create an Axum router for the gateway with middleware
    pub fn into_router(self) -> Router {
        let middleware_stack =
            GatewayMiddlewareStack::new(self.metrics.clone(), self.reporter.clone())
                .with_error_details(self.expose_error_details);

        let router = Router::new()
            .route(paths::METRICS, get(metrics_handler))
            .route(paths::HEALTH, get(health_handler))
            .route(paths::READY, get(ready_handler))
            .route(paths::LIVE, get(live_handler))
            .route(paths::API_ROOT, any(proxy_handler))
            .route(paths::API_ROUTE, any(proxy_handler))
            .fallback(not_found_handler)
            .with_state(Arc::new(self));

        middleware_stack.apply_to_router(router)
    }
}

/// Axum handler for proxying `/api/*` requests
async fn proxy_handler(
    State(gateway): State<Arc<GatewayService>>,
    request: Request,
) -> ProxyOutcome {
    gateway.forwarder.proxy(request).await
}

/// Prometheus exposition
async fn metrics_handler(State(gateway): State<Arc<GatewayService>>) -> Response {
    match gateway.metrics.render() {
        Ok(text) => (
            StatusCode::OK,
            [(CONTENT_TYPE, gateway.metrics.content_type())],
            text,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "{}", log_messages::metrics::RENDER_FAILED);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to render metrics: {e}"),
            )
                .into_response()
        }
    }
}

/// Health with backend diagnostics
async fn health_handler(State(gateway): State<Arc<GatewayService>>) -> Response {
    let backend = gateway.health.check().await;
    let report = HealthReport::new(
        gateway.service_name.clone(),
        gateway.started_at.elapsed(),
        backend,
    );

    let status = if report.ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report)).into_response()
}

/// Readiness: ready when the backend probe succeeds
async fn ready_handler(State(gateway): State<Arc<GatewayService>>) -> Response {
    let ready = gateway.health.check().await.healthy;

    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(ReadinessReport { ready })).into_response()
}

/// Liveness: the process is serving requests
async fn live_handler() -> Json<LivenessReport> {
    Json(LivenessReport { alive: true })
}

async fn not_found_handler(uri: Uri) -> Response {
    ErrorResponse::not_found(uri.path()).into_response_with_status(StatusCode::NOT_FOUND)
}
