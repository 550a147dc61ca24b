//! Backend health probing and the health, readiness and liveness reports

use crate::infrastructure::log_messages;
use crate::proxy::forwarder::HttpClient;
use crate::proxy::types::*;
use crate::proxy::url_resolver::UrlResolver;
use axum::body::Body;
use chrono::{DateTime, Utc};
use http::{Method, Request, Uri};
use serde::Serialize;
use std::time::Duration;
use tracing::warn;

/// Result of one backend probe
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BackendHealth {
    pub healthy: bool,
    pub error: Option<String>,
}

impl BackendHealth {
    pub fn healthy() -> Self {
        Self {
            healthy: true,
            error: None,
        }
    }

    pub fn unhealthy(error: impl Into<String>) -> Self {
        Self {
            healthy: false,
            error: Some(error.into()),
        }
    }
}

/// Probes `GET <upstream><health_path>` under a timeout
#[derive(Clone)]
pub struct HealthChecker {
    client: HttpClient,
    probe_uri: Uri,
    timeout: Duration,
}

impl HealthChecker {
    pub fn new(
        client: HttpClient,
        upstream: &UpstreamUrl,
        config: &HealthProbeConfig,
    ) -> ProxyResult<Self> {
        Ok(Self {
            client,
            probe_uri: UrlResolver::resolve_health_uri(upstream, &config.path)?,
            timeout: *config.timeout.as_ref(),
        })
    }

    pub fn probe_uri(&self) -> &Uri {
        &self.probe_uri
    }

    /// One probe; any failure or non-2xx status is unhealthy
    pub async fn check(&self) -> BackendHealth {
        let request = match Request::builder()
            .method(Method::GET)
            .uri(self.probe_uri.clone())
            .body(Body::empty())
        {
            Ok(request) => request,
            Err(e) => return BackendHealth::unhealthy(e.to_string()),
        };

        let health = match tokio::time::timeout(self.timeout, self.client.request(request)).await
        {
            Ok(Ok(response)) if response.status().is_success() => BackendHealth::healthy(),
            Ok(Ok(response)) => BackendHealth::unhealthy(format!(
                "Backend responded with status {}",
                response.status().as_u16()
            )),
            Ok(Err(e)) => BackendHealth::unhealthy(e.to_string()),
            Err(_) => BackendHealth::unhealthy(format!(
                "Backend health check timed out after {}ms",
                self.timeout.as_millis()
            )),
        };

        if let Some(error) = &health.error {
            warn!(
                probe_uri = %self.probe_uri,
                error = error.as_str(),
                "{}",
                log_messages::health::PROBE_FAILED
            );
        }

        health
    }
}

/// Body of `GET /health`
#[derive(Clone, Debug, Serialize)]
pub struct HealthReport {
    pub ok: bool,
    pub timestamp: DateTime<Utc>,
    pub service: String,
    /// Seconds since the gateway started
    pub uptime: f64,
    pub backend: BackendHealth,
}

impl HealthReport {
    pub fn new(service: impl Into<String>, uptime: Duration, backend: BackendHealth) -> Self {
        Self {
            ok: backend.healthy,
            timestamp: Utc::now(),
            service: service.into(),
            uptime: uptime.as_secs_f64(),
            backend,
        }
    }
}

/// Body of `GET /ready`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ReadinessReport {
    pub ready: bool,
}

/// Body of `GET /live`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct LivenessReport {
    pub alive: bool,
}
