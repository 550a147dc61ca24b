use crate::infrastructure::metrics::MetricsError;
use crate::proxy::types::ProxyError;
use thiserror::Error;

/// Gateway startup and configuration error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("Invalid upstream URL '{url}': {reason}")]
    InvalidUpstreamUrl { url: String, reason: String },

    #[error("Invalid setting {key}: {reason}")]
    InvalidSetting { key: &'static str, reason: String },

    #[error("Metrics error: {0}")]
    Metrics(#[from] MetricsError),

    #[error("Telemetry error: {0}")]
    Telemetry(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Proxy error: {0}")]
    Proxy(#[from] ProxyError),
}

pub type Result<T> = std::result::Result<T, Error>;
