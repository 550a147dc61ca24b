use crate::config::Settings;
use crate::infrastructure::error_reporting::TracingErrorReporter;
use crate::infrastructure::log_messages;
use crate::infrastructure::metrics::PrometheusMetrics;
use crate::proxy::forwarder::build_http_client;
use crate::proxy::{GatewayCollaborators, GatewayService};
use crate::Result;
use axum::Router;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, instrument, warn};

/// Main application struct that coordinates all components
pub struct Application {
    settings: Settings,
    router: Router,
}

impl Application {
    /// Build the gateway with Prometheus metrics and tracing-backed error reporting
    pub fn new(settings: Settings) -> Result<Self> {
        let collaborators = GatewayCollaborators {
            metrics: Arc::new(PrometheusMetrics::new()?),
            reporter: Arc::new(TracingErrorReporter),
        };
        Self::with_collaborators(settings, collaborators)
    }

    pub fn with_collaborators(
        settings: Settings,
        collaborators: GatewayCollaborators,
    ) -> Result<Self> {
        let config = settings.gateway_config()?;
        let router =
            GatewayService::with_client(config, collaborators, build_http_client())?.into_router();

        Ok(Self { settings, router })
    }

    /// Bind the configured address and serve until SIGINT or SIGTERM
    #[instrument(skip(self))]
    pub async fn run(self) -> Result<()> {
        let listener = TcpListener::bind(self.settings.bind_address()?).await?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Serve on `listener` until `shutdown` resolves, then drain in-flight requests
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let address = listener.local_addr()?;
        info!(
            address = %address,
            upstream = %self.settings.upstream.base_url,
            service = %self.settings.application.service_name,
            "{}",
            log_messages::application::LISTENING
        );

        axum::serve(
            listener,
            self.router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await?;

        info!("{}", log_messages::application::STOPPED);
        Ok(())
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}

/// Resolves on Ctrl-C, or SIGTERM on Unix
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(
                error = %e,
                signal = "ctrl_c",
                "{}",
                log_messages::application::SIGNAL_HANDLER_FAILED
            );
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(
                    error = %e,
                    signal = "sigterm",
                    "{}",
                    log_messages::application::SIGNAL_HANDLER_FAILED
                );
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("{}", log_messages::application::SHUTDOWN_SIGNAL);
}
