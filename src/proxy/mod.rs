//! Reverse proxy for the storefront backend
//!
//! Every `/api/*` request is forwarded to a single upstream:
//! - Forwarder: one outbound request per inbound request, classified outcome
//! - Relay: upstream body streamed back under the size limit and deadline
//! - Middleware: request IDs, logging, HTTP metrics and panic recovery

pub mod error_response;
pub mod forwarder;
pub mod headers;
pub mod health;
pub mod middleware;
pub mod middleware_stack;
pub mod outcome;
pub mod relay_body;
pub mod service;
pub mod types;
pub mod url_resolver;

#[cfg(test)]
pub mod test_utils;




pub use outcome::ProxyOutcome;
pub use service::{GatewayCollaborators, GatewayService};
pub use types::{GatewayConfig, ProxyConfig, ProxyError, ProxyResult};
