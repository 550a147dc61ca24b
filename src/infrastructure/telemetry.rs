//! Tracing subscriber installation

use crate::config::{LogFormat, LoggingSettings};
use crate::error::{Error, Result};
use tracing_subscriber::EnvFilter;

/// Build the event filter: `RUST_LOG` when set, otherwise the configured level
pub fn env_filter(settings: &LoggingSettings) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&settings.level)
            .map_err(|e| Error::Telemetry(format!("invalid log level '{}': {e}", settings.level))),
    }
}

/// Install the global subscriber. Must be called once, before the first event.
pub fn init_tracing(settings: &LoggingSettings) -> Result<()> {
    let filter = env_filter(settings)?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let installed = match settings.format {
        LogFormat::Json => builder
            .json()
            .flatten_event(true)
            .with_current_span(false)
            .try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };

    installed.map_err(|e| Error::Telemetry(e.to_string()))
}
