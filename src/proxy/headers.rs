//! HTTP header constants and the proxy header policy
//!
//! Outbound requests carry only the headers built here; responses relayed
//! back to the client carry only the allow-listed upstream headers.

use ::http::header::{self, HeaderMap, HeaderName, HeaderValue};

use crate::proxy::types::{InboundRequest, RequestId};

/// Header name for request ID used for tracing and correlation
pub const X_REQUEST_ID: &str = "x-request-id";

/// Client address as seen by the gateway
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Scheme the client used to reach the gateway
pub const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Content type assumed for inbound bodies that do not declare one
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// Value used for `X-Forwarded-For` when the peer address is unknown
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Upstream response headers allowed to cross the gateway
pub static RESPONSE_HEADER_ALLOW_LIST: [HeaderName; 2] =
    [header::CONTENT_TYPE, header::CONTENT_LENGTH];

pub use header::{CONTENT_LENGTH, CONTENT_TYPE};

/// Well-known gateway paths
pub mod paths {
    /// Prometheus exposition
    pub const METRICS: &str = "/metrics";

    /// Health with backend diagnostics
    pub const HEALTH: &str = "/health";

    /// Readiness probe
    pub const READY: &str = "/ready";

    /// Liveness probe
    pub const LIVE: &str = "/live";

    /// Prefix of every proxied path; the wildcard route does not match it alone
    pub const API_ROOT: &str = "/api/";

    /// Route template matching every proxied path
    pub const API_ROUTE: &str = "/api/{*path}";

    /// Default path when none is specified
    pub const DEFAULT: &str = "/";
}

/// Build the outbound header set for a forwarded request.
///
/// `request_id` is `None` when correlation-id propagation is disabled.
pub fn forward_headers(inbound: &InboundRequest, request_id: Option<&RequestId>) -> HeaderMap {
    let mut headers = HeaderMap::new();

    if inbound.has_body() {
        let content_type = inbound
            .headers
            .get(header::CONTENT_TYPE)
            .cloned()
            .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
        headers.insert(header::CONTENT_TYPE, content_type);
    }

    let client = inbound
        .client_ip
        .and_then(|ip| HeaderValue::from_str(&ip.to_string()).ok())
        .unwrap_or_else(|| HeaderValue::from_static(UNKNOWN_CLIENT));
    headers.insert(X_FORWARDED_FOR, client);
    headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static(inbound.scheme()));

    if let Some(value) = request_id.and_then(RequestId::to_header_value) {
        headers.insert(X_REQUEST_ID, value);
    }

    headers
}

/// Keep only the allow-listed headers of an upstream response
pub fn filter_response_headers(upstream: &HeaderMap, include_request_id: bool) -> HeaderMap {
    let mut headers = HeaderMap::new();

    for name in RESPONSE_HEADER_ALLOW_LIST.iter() {
        if let Some(value) = upstream.get(name) {
            headers.insert(name.clone(), value.clone());
        }
    }

    if include_request_id {
        if let Some(value) = upstream.get(X_REQUEST_ID) {
            headers.insert(X_REQUEST_ID, value.clone());
        }
    }

    headers
}
