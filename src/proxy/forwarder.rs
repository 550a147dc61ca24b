//! Upstream forwarding
//!
//! One inbound request becomes exactly one outbound request: no retries, no
//! fan-out. The response head must arrive before the deadline; the relayed body
//! is held to the same deadline by [`RelayBody`].

use crate::infrastructure::error_reporting::{ErrorContext, ErrorReporter};
use crate::infrastructure::log_messages::request_processing;
use crate::infrastructure::metrics::{names, MetricsSink};
use crate::proxy::headers::{filter_response_headers, CONTENT_LENGTH};
use crate::proxy::outcome::ProxyOutcome;
use crate::proxy::relay_body::{RelayBody, RelayContext};
use crate::proxy::types::*;
use crate::proxy::url_resolver::build_forwarded_request;
use axum::body::Body;
use axum::extract::Request;
use http::HeaderMap;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use std::error::Error as StdError;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{error, info, warn};

/// Stage names used in error reports
pub const STAGE_PROXY: &str = "proxy";
pub const STAGE_RELAY: &str = "relay";

/// HTTP client shared by the forwarder and the health probe
pub type HttpClient = Client<HttpConnector, Body>;

/// Canceled requests on a closed pooled connection are not re-sent
pub fn build_http_client() -> HttpClient {
    Client::builder(TokioExecutor::new())
        .retry_canceled_requests(false)
        .build_http()
}

/// Forwards `/api/*` requests to the configured upstream
#[derive(Clone)]
pub struct UpstreamForwarder {
    config: Arc<ProxyConfig>,
    client: HttpClient,
    metrics: Arc<dyn MetricsSink>,
    reporter: Arc<dyn ErrorReporter>,
}

impl UpstreamForwarder {
    pub fn new(
        config: ProxyConfig,
        client: HttpClient,
        metrics: Arc<dyn MetricsSink>,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            client,
            metrics,
            reporter,
        }
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Proxy one inbound request and classify the result
    pub async fn proxy(&self, request: Request) -> ProxyOutcome {
        let inbound = match InboundRequest::from_request(request, self.config.max_body_size).await
        {
            Ok(inbound) => inbound,
            Err(error) => {
                warn!(
                    outcome = error.kind(),
                    error = %error,
                    "{}",
                    request_processing::PROXY_FAILED
                );
                return ProxyOutcome::Failed(error);
            }
        };

        let start = Instant::now();
        let outcome = ProxyOutcome::from(self.forward(&inbound).await);
        self.record(&inbound, &outcome, start.elapsed());

        outcome
    }

    async fn forward(&self, inbound: &InboundRequest) -> ProxyResult<UpstreamResponse> {
        let deadline = Instant::now() + self.config.timeout();
        let request = build_forwarded_request(inbound, &self.config)?;

        let response = match timeout_at(deadline, self.client.request(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(self.classify_client_error(&e)),
            Err(_) => {
                return Err(ProxyError::UpstreamTimeout {
                    target: self.config.target().to_string(),
                    timeout: self.config.timeout(),
                })
            }
        };

        let (parts, body) = response.into_parts();

        if let Some(length) = declared_length(&parts.headers) {
            if length > self.config.max_body_bytes() {
                return Err(ProxyError::ResponseTooLarge {
                    limit: self.config.max_body_size,
                });
            }
        }

        let headers = filter_response_headers(&parts.headers, self.config.propagate_request_id);
        let context = RelayContext::new(
            self.reporter.clone(),
            self.error_context(STAGE_RELAY, inbound),
        );
        let body = Body::new(RelayBody::new(
            body,
            deadline,
            self.config.max_body_size,
            context,
        ));

        Ok(UpstreamResponse {
            status: parts.status,
            headers,
            body,
        })
    }

    fn classify_client_error(&self, error: &hyper_util::client::legacy::Error) -> ProxyError {
        classify_transport_error(error, self.config.target(), self.config.timeout())
    }

    fn error_context(&self, stage: &'static str, inbound: &InboundRequest) -> ErrorContext {
        ErrorContext::new(stage)
            .with_request_id(inbound.request_id.as_str())
            .with_request(inbound.method.as_str(), inbound.path())
            .with_target(self.config.target())
    }

    fn record(&self, inbound: &InboundRequest, outcome: &ProxyOutcome, elapsed: Duration) {
        let target = self.config.target();
        let status = outcome.status();
        let status_label = status.as_u16().to_string();

        self.metrics.increment_counter(
            names::PROXY_REQUESTS_TOTAL,
            &[
                (names::LABEL_TARGET, target),
                (names::LABEL_STATUS, status_label.as_str()),
            ],
        );
        self.metrics.observe_histogram(
            names::PROXY_REQUEST_DURATION_SECONDS,
            &[(names::LABEL_TARGET, target)],
            elapsed.as_secs_f64(),
        );

        let duration_ms = elapsed.as_millis() as u64;
        match outcome {
            ProxyOutcome::Forwarded(_) => info!(
                request_id = %inbound.request_id,
                method = %inbound.method,
                path = inbound.path(),
                outcome = outcome.label(),
                status = status.as_u16(),
                duration_ms,
                "{}",
                request_processing::REQUEST_FORWARDED
            ),
            ProxyOutcome::UpstreamError(_) => warn!(
                request_id = %inbound.request_id,
                method = %inbound.method,
                path = inbound.path(),
                outcome = outcome.label(),
                status = status.as_u16(),
                duration_ms,
                "{}",
                request_processing::UPSTREAM_ERROR_STATUS
            ),
            ProxyOutcome::Failed(failure) => {
                error!(
                    request_id = %inbound.request_id,
                    method = %inbound.method,
                    path = inbound.path(),
                    outcome = outcome.label(),
                    status = status.as_u16(),
                    duration_ms,
                    error = %failure,
                    "{}",
                    request_processing::PROXY_FAILED
                );
                if failure.is_reportable() {
                    self.reporter
                        .capture_exception(failure, &self.error_context(STAGE_PROXY, inbound));
                }
            }
        }
    }
}

/// `Content-Length` announced by the upstream, if present and well-formed
fn declared_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
}

/// Map a client failure to the gateway taxonomy by the I/O errors in its source chain
pub fn classify_transport_error(
    error: &(dyn StdError + 'static),
    target: &str,
    timeout: Duration,
) -> ProxyError {
    let kinds = io_error_kinds(error);

    if kinds.contains(&io::ErrorKind::ConnectionRefused) {
        ProxyError::UpstreamUnavailable {
            target: target.to_string(),
            reason: chain_text(error),
        }
    } else if kinds.contains(&io::ErrorKind::TimedOut) {
        ProxyError::UpstreamTimeout {
            target: target.to_string(),
            timeout,
        }
    } else {
        ProxyError::Transport {
            target: target.to_string(),
            reason: chain_text(error),
        }
    }
}

fn io_error_kinds(error: &(dyn StdError + 'static)) -> Vec<io::ErrorKind> {
    let mut kinds = Vec::new();
    let mut current = Some(error);

    while let Some(err) = current {
        if let Some(io_error) = err.downcast_ref::<io::Error>() {
            kinds.push(io_error.kind());
            if let Some(inner) = io_error.get_ref() {
                kinds.extend(io_error_kinds(inner));
            }
        }
        current = err.source();
    }

    kinds
}

fn chain_text(error: &(dyn StdError + 'static)) -> String {
    let mut text = error.to_string();
    let mut current = error.source();
    while let Some(cause) = current {
        text.push_str(": ");
        text.push_str(&cause.to_string());
        current = cause.source();
    }
    text
}
