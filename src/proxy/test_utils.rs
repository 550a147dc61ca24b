//! Test utilities for proxy module testing
//!
//! Recording fakes for the injected collaborators, mock upstream servers bound
//! to ephemeral ports, and test configurations.

use crate::infrastructure::error_reporting::{ErrorContext, ErrorReporter};
use crate::infrastructure::metrics::{MetricsError, MetricsSink};
use crate::proxy::service::{GatewayCollaborators, GatewayService};
use crate::proxy::types::*;
use axum::{
    body::Body,
    extract::Request,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json, Router,
};
use std::error::Error as StdError;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

/// One exception passed to [`RecordingErrorReporter`]
#[derive(Clone, Debug)]
pub struct CapturedError {
    pub message: String,
    pub context: ErrorContext,
}

/// Error reporter that keeps every capture for later assertions
#[derive(Default)]
pub struct RecordingErrorReporter {
    captures: Mutex<Vec<CapturedError>>,
}

impl RecordingErrorReporter {
    pub fn captures(&self) -> Vec<CapturedError> {
        self.captures.lock().unwrap().clone()
    }
}

impl ErrorReporter for RecordingErrorReporter {
    fn capture_exception(&self, error: &(dyn StdError + 'static), context: &ErrorContext) {
        self.captures.lock().unwrap().push(CapturedError {
            message: error.to_string(),
            context: context.clone(),
        });
    }
}

/// One metric update seen by [`RecordingMetrics`]
#[derive(Clone, Debug, PartialEq)]
pub struct MetricRecord {
    pub name: String,
    pub labels: Vec<(String, String)>,
    pub value: f64,
}

impl MetricRecord {
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }
}

/// Metrics sink that records every update
#[derive(Default)]
pub struct RecordingMetrics {
    records: Mutex<Vec<MetricRecord>>,
}

impl RecordingMetrics {
    pub fn records(&self) -> Vec<MetricRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn records_named(&self, name: &str) -> Vec<MetricRecord> {
        self.records()
            .into_iter()
            .filter(|record| record.name == name)
            .collect()
    }

    fn push(&self, name: &str, labels: &[(&str, &str)], value: f64) {
        self.records.lock().unwrap().push(MetricRecord {
            name: name.to_string(),
            labels: labels
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
            value,
        });
    }
}

impl MetricsSink for RecordingMetrics {
    fn increment_counter(&self, name: &str, labels: &[(&str, &str)]) {
        self.push(name, labels, 1.0);
    }

    fn observe_histogram(&self, name: &str, labels: &[(&str, &str)], value: f64) {
        self.push(name, labels, value);
    }

    fn render(&self) -> Result<String, MetricsError> {
        Ok(self
            .records()
            .iter()
            .map(|record| format!("{} {}", record.name, record.value))
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

/// Recording fakes wired into a gateway under test
#[derive(Default)]
pub struct TestCollaborators {
    pub metrics: Arc<RecordingMetrics>,
    pub reporter: Arc<RecordingErrorReporter>,
}

impl TestCollaborators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collaborators(&self) -> GatewayCollaborators {
        GatewayCollaborators {
            metrics: self.metrics.clone(),
            reporter: self.reporter.clone(),
        }
    }
}

/// Serve `router` on an ephemeral local port for the rest of the test
pub async fn spawn_upstream(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    addr
}

/// A local address nothing listens on
pub async fn refused_address() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Proxy configuration for a local upstream with a short timeout
pub fn test_proxy_config(upstream: SocketAddr) -> ProxyConfig {
    let mut config = ProxyConfig::new(
        UpstreamUrl::try_new(format!("http://{upstream}")).expect("socket address is a valid URL"),
    );
    config.timeout = ProxyTimeout::try_new(Duration::from_millis(500)).expect("500ms is valid");
    config.max_body_size = BodySizeLimit::try_new(1024 * 1024).expect("1MB is valid");
    config
}

/// Gateway configuration for a local upstream with short timeouts
pub fn test_gateway_config(upstream: SocketAddr) -> GatewayConfig {
    let mut config = GatewayConfig::new(test_proxy_config(upstream));
    config.health.timeout =
        ProbeTimeout::try_new(Duration::from_millis(500)).expect("500ms is valid");
    config.service_name = "gateway-test".to_string();
    config
}

/// Build the gateway router for `config` with recording collaborators
pub fn test_router(config: GatewayConfig, fakes: &TestCollaborators) -> Router {
    GatewayService::new(config, fakes.collaborators())
        .expect("test configuration is valid")
        .into_router()
}

/// Upstream handler that echoes method, URI, headers and body as JSON
pub async fn echo_handler(request: Request) -> Result<impl IntoResponse, StatusCode> {
    let (parts, body) = request.into_parts();
    let body_bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?;

    let headers: serde_json::Map<String, serde_json::Value> = parts
        .headers
        .iter()
        .map(|(name, value)| {
            (
                name.to_string(),
                serde_json::Value::String(value.to_str().unwrap_or("<binary>").to_string()),
            )
        })
        .collect();

    Ok(Json(serde_json::json!({
        "method": parts.method.to_string(),
        "uri": parts.uri.to_string(),
        "headers": headers,
        "body": String::from_utf8_lossy(&body_bytes),
    })))
}

/// Upstream handler that answers after `delay`
pub async fn slow_handler(delay: Duration) -> Response {
    tokio::time::sleep(delay).await;
    (StatusCode::OK, "slow response").into_response()
}

/// Read a whole response body as JSON
pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Read a whole response body as bytes
pub async fn body_bytes(response: Response) -> bytes::Bytes {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
}

/// Build a request with an empty body
pub fn empty_request(method: &str, uri: &str) -> Request {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}
