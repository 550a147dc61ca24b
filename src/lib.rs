//! Storefront Gateway - API gateway in front of the storefront backend
//!
//! Every request under `/api` is relayed to a single upstream. The gateway adds
//! request correlation, forwarding headers, bounded body sizes and deadlines,
//! and serves its own health, readiness, liveness and Prometheus endpoints.

pub mod application;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod proxy;

pub use application::Application;
pub use error::{Error, Result};
