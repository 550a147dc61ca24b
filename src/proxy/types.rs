//! Type definitions for the proxy module

use axum::body::Body;
use axum::extract::{ConnectInfo, FromRequestParts};
use bytes::Bytes;
use http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
use http_body_util::BodyExt;
use nutype::nutype;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::proxy::headers::X_REQUEST_ID;

// ========== Size and Time Types ==========

/// Maximum size in bytes for request and response bodies crossing the proxy
#[nutype(
    validate(predicate = |size: &usize| *size > 0),
    derive(Clone, Copy, Debug, Display, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, AsRef)
)]
pub struct BodySizeLimit(usize);

/// Deadline for one upstream exchange
#[nutype(
    validate(predicate = |timeout: &Duration| !timeout.is_zero()),
    derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, AsRef)
)]
pub struct ProxyTimeout(Duration);

/// Deadline for one backend health probe
#[nutype(
    validate(predicate = |timeout: &Duration| !timeout.is_zero()),
    derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, AsRef)
)]
pub struct ProbeTimeout(Duration);

// ========== Upstream Types ==========

/// Base URL of the single upstream backend.
///
/// Only plain `http://` URLs with an authority are accepted. A path prefix is
/// allowed; a query or fragment is not. Trailing slashes are stripped so the
/// inbound path can be appended verbatim.
#[nutype(
    sanitize(with = |url: String| url.trim().trim_end_matches('/').to_string()),
    validate(predicate = |url: &str| is_valid_upstream_url(url)),
    derive(Clone, Debug, Display, PartialEq, Eq, Serialize, Deserialize, AsRef)
)]
pub struct UpstreamUrl(String);

fn is_valid_upstream_url(url: &str) -> bool {
    if url.contains('#') {
        return false;
    }

    match url.parse::<Uri>() {
        Ok(uri) => {
            uri.scheme_str() == Some("http") && uri.authority().is_some() && uri.query().is_none()
        }
        Err(_) => false,
    }
}

/// Path on the upstream answering health probes
#[nutype(
    sanitize(trim),
    validate(predicate = |path: &str| path.starts_with('/')),
    derive(Clone, Debug, Display, PartialEq, Eq, Serialize, Deserialize, AsRef)
)]
pub struct HealthPath(String);

// ========== Correlation ==========

/// Maximum accepted length of an inbound correlation identifier
pub const MAX_REQUEST_ID_LEN: usize = 128;

/// Correlation identifier carried in `X-Request-Id`
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RequestId(String);

impl RequestId {
    /// Generate a fresh identifier: a v7 UUID (millisecond timestamp followed by random bits)
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Accept an inbound identifier if it is non-empty, bounded and visible ASCII
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        let acceptable = !value.is_empty()
            && value.len() <= MAX_REQUEST_ID_LEN
            && value.bytes().all(|b| b.is_ascii_graphic());

        acceptable.then(|| Self(value.to_string()))
    }

    /// Reuse the identifier already present on a request, or generate one
    pub fn from_headers(headers: &HeaderMap) -> Self {
        headers
            .get(X_REQUEST_ID)
            .and_then(|value| value.to_str().ok())
            .and_then(Self::parse)
            .unwrap_or_else(Self::generate)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn to_header_value(&self) -> Option<HeaderValue> {
        HeaderValue::from_str(&self.0).ok()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ========== Configuration ==========

/// Default deadline for one upstream exchange
pub const DEFAULT_PROXY_TIMEOUT: Duration = Duration::from_secs(30);

/// Default body size limit (50 MiB)
pub const DEFAULT_MAX_BODY_BYTES: usize = 50 * 1024 * 1024;

/// Default deadline for a backend health probe
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default upstream health endpoint
pub const DEFAULT_HEALTH_PATH: &str = "/api/health";

/// Proxy configuration
#[derive(Clone, Debug)]
pub struct ProxyConfig {
    /// Upstream every `/api/*` request is forwarded to
    pub upstream_url: UpstreamUrl,
    /// Deadline covering the response head and the relayed body
    pub timeout: ProxyTimeout,
    /// Limit applied to both request and response bodies
    pub max_body_size: BodySizeLimit,
    /// Forward `X-Request-Id` upstream and back
    pub propagate_request_id: bool,
}

impl ProxyConfig {
    /// Configuration with default timeout and size limit for the given upstream
    pub fn new(upstream_url: UpstreamUrl) -> Self {
        Self {
            upstream_url,
            timeout: ProxyTimeout::try_new(DEFAULT_PROXY_TIMEOUT).expect("30s is a valid timeout"),
            max_body_size: BodySizeLimit::try_new(DEFAULT_MAX_BODY_BYTES)
                .expect("50MB is a valid limit"),
            propagate_request_id: true,
        }
    }

    pub fn timeout(&self) -> Duration {
        *self.timeout.as_ref()
    }

    pub fn max_body_bytes(&self) -> usize {
        *self.max_body_size.as_ref()
    }

    /// Upstream label used in metrics and logs
    pub fn target(&self) -> &str {
        self.upstream_url.as_ref()
    }
}

/// Backend health probe configuration
#[derive(Clone, Debug)]
pub struct HealthProbeConfig {
    pub path: HealthPath,
    pub timeout: ProbeTimeout,
}

impl Default for HealthProbeConfig {
    fn default() -> Self {
        Self {
            path: HealthPath::try_new(DEFAULT_HEALTH_PATH.to_string())
                .expect("DEFAULT_HEALTH_PATH starts with a slash"),
            timeout: ProbeTimeout::try_new(DEFAULT_PROBE_TIMEOUT).expect("5s is a valid timeout"),
        }
    }
}

/// Everything the gateway router needs besides its collaborators
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    pub proxy: ProxyConfig,
    pub health: HealthProbeConfig,
    /// Name reported by `/health`
    pub service_name: String,
    /// Include panic details in 500 responses (disabled in production)
    pub expose_error_details: bool,
}

impl GatewayConfig {
    pub fn new(proxy: ProxyConfig) -> Self {
        Self {
            proxy,
            health: HealthProbeConfig::default(),
            service_name: "gateway".to_string(),
            expose_error_details: true,
        }
    }
}

// ========== Per-request Entities ==========

/// An inbound request with its body fully read
#[derive(Clone, Debug)]
pub struct InboundRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Peer address of the client connection, when the server recorded it
    pub client_ip: Option<IpAddr>,
    pub request_id: RequestId,
}

impl InboundRequest {
    /// Read an axum request, enforcing the body size limit
    pub async fn from_request(
        request: axum::extract::Request,
        limit: BodySizeLimit,
    ) -> ProxyResult<Self> {
        let (mut parts, body) = request.into_parts();
        let client_ip = ConnectInfo::<SocketAddr>::from_request_parts(&mut parts, &())
            .await
            .ok()
            .map(|ConnectInfo(addr)| addr.ip());
        let request_id = RequestId::from_headers(&parts.headers);

        let body = read_limited(body, limit).await?;

        Ok(Self {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            body,
            client_ip,
            request_id,
        })
    }

    pub fn has_body(&self) -> bool {
        !self.body.is_empty()
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Scheme the client used; `http` unless the request line carried one
    pub fn scheme(&self) -> &'static str {
        match self.uri.scheme_str() {
            Some("https") => "https",
            _ => "http",
        }
    }
}

async fn read_limited(body: Body, limit: BodySizeLimit) -> ProxyResult<Bytes> {
    let collected = http_body_util::Limited::new(body, *limit.as_ref())
        .collect()
        .await
        .map_err(|e| {
            if e.is::<http_body_util::LengthLimitError>() {
                ProxyError::RequestTooLarge { limit }
            } else {
                ProxyError::InvalidRequestBody(e.to_string())
            }
        })?;

    Ok(collected.to_bytes())
}

/// Upstream response ready to be relayed: status, allow-listed headers, lazy body
#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Body,
}

// ========== Errors ==========

/// Errors that can occur while proxying one request
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Upstream {target} refused the connection: {reason}")]
    UpstreamUnavailable { target: String, reason: String },

    #[error("Upstream {target} did not respond within {timeout:?}")]
    UpstreamTimeout { target: String, timeout: Duration },

    #[error("Transport error talking to {target}: {reason}")]
    Transport { target: String, reason: String },

    #[error("Request body exceeds {limit} bytes")]
    RequestTooLarge { limit: BodySizeLimit },

    #[error("Upstream response exceeds {limit} bytes")]
    ResponseTooLarge { limit: BodySizeLimit },

    #[error("Failed to read request body: {0}")]
    InvalidRequestBody(String),

    #[error("Response already started: {reason}")]
    ResponseAlreadyStarted { reason: String },
}

impl ProxyError {
    /// Stable outcome label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::UpstreamUnavailable { .. } => "upstream_unavailable",
            ProxyError::UpstreamTimeout { .. } => "upstream_timeout",
            ProxyError::Transport { .. } => "transport_error",
            ProxyError::RequestTooLarge { .. } => "request_too_large",
            ProxyError::ResponseTooLarge { .. } => "response_too_large",
            ProxyError::InvalidRequestBody(_) => "invalid_request_body",
            ProxyError::ResponseAlreadyStarted { .. } => "response_already_started",
        }
    }

    /// Whether the failure lies upstream and should reach the error reporter
    pub fn is_reportable(&self) -> bool {
        !matches!(
            self,
            ProxyError::RequestTooLarge { .. } | ProxyError::InvalidRequestBody(_)
        )
    }
}

/// Result type for proxy operations
pub type ProxyResult<T> = Result<T, ProxyError>;
