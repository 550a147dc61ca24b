//! Upstream URL resolution and forwarded request construction

use crate::proxy::headers::{forward_headers, paths};
use crate::proxy::types::*;
use axum::body::Body;
use hyper::{Request, Uri};

/// Strategy for composing upstream URIs from the configured base URL
pub struct UrlResolver;

impl UrlResolver {
    /// Resolve the final URI for the outgoing request.
    ///
    /// The upstream base URL is prepended to the inbound path and query
    /// unchanged, so `/api/products?page=2` becomes
    /// `http://backend:3847/api/products?page=2`.
    pub fn resolve_upstream_uri(upstream: &UpstreamUrl, original_uri: &Uri) -> ProxyResult<Uri> {
        let path_and_query = original_uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or(paths::DEFAULT);

        let resolved = format!("{}{}", upstream.as_ref(), path_and_query);

        resolved.parse().map_err(|e| ProxyError::Transport {
            target: upstream.to_string(),
            reason: format!("invalid upstream URI '{resolved}': {e}"),
        })
    }

    /// URI of the upstream health endpoint
    pub fn resolve_health_uri(upstream: &UpstreamUrl, health_path: &HealthPath) -> ProxyResult<Uri> {
        let resolved = format!("{}{}", upstream.as_ref(), health_path.as_ref());

        resolved.parse().map_err(|e| ProxyError::Transport {
            target: upstream.to_string(),
            reason: format!("invalid health URI '{resolved}': {e}"),
        })
    }
}

/// Derive the single outbound request for an inbound one
pub fn build_forwarded_request(
    inbound: &InboundRequest,
    config: &ProxyConfig,
) -> ProxyResult<Request<Body>> {
    let uri = UrlResolver::resolve_upstream_uri(&config.upstream_url, &inbound.uri)?;
    let request_id = config.propagate_request_id.then_some(&inbound.request_id);

    let mut request = Request::builder()
        .method(inbound.method.clone())
        .uri(uri)
        .body(Body::from(inbound.body.clone()))
        .map_err(|e| ProxyError::Transport {
            target: config.target().to_string(),
            reason: format!("failed to build upstream request: {e}"),
        })?;
    *request.headers_mut() = forward_headers(inbound, request_id);

    Ok(request)
}
