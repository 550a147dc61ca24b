//! Log message constants for the gateway
//!
//! This module centralizes the messages emitted through `tracing` so that log
//! queries and alerts can match on stable texts.

/// Application startup and lifecycle messages
pub mod application {
    pub const STARTING: &str = "Starting gateway";
    pub const LISTENING: &str = "Gateway listening";
    pub const SHUTDOWN_SIGNAL: &str = "Shutdown signal received, draining connections";
    pub const STOPPED: &str = "Gateway stopped";
    pub const STARTUP_FAILED: &str = "Gateway failed to start";
    pub const SIGNAL_HANDLER_FAILED: &str = "Failed to install shutdown signal handler";
}

/// Request/response processing messages
pub mod request_processing {
    pub const REQUEST_RECEIVED: &str = "Incoming request";
    pub const REQUEST_COMPLETED: &str = "Request completed";
    pub const REQUEST_FORWARDED: &str = "Request forwarded";
    pub const UPSTREAM_ERROR_STATUS: &str = "Upstream returned an error status";
    pub const PROXY_FAILED: &str = "Proxy request failed";
    pub const RELAY_ABORTED: &str = "Response relay aborted after headers were sent";
    pub const HANDLER_PANICKED: &str = "Handler panicked";
}

/// Backend health probing messages
pub mod health {
    pub const PROBE_FAILED: &str = "Backend health probe failed";
}

/// Metrics exposition messages
pub mod metrics {
    pub const RENDER_FAILED: &str = "Failed to render metrics";
}
