//! Application wiring: settings, collaborators, listener and shutdown

pub mod app;

pub use app::Application;
