//! Infrastructure layer: telemetry, metrics and error reporting

pub mod error_reporting;
pub mod log_messages;
pub mod metrics;
pub mod telemetry;
