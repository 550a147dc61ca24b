use anyhow::Result;
use storefront_gateway::config::Settings;
use storefront_gateway::infrastructure::{log_messages, telemetry};
use storefront_gateway::Application;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::new()?;
    telemetry::init_tracing(&settings.logging)?;

    info!(
        service = %settings.application.service_name,
        environment = %settings.application.environment,
        "{}",
        log_messages::application::STARTING
    );

    let app = Application::new(settings)
        .inspect_err(|e| error!(error = %e, "{}", log_messages::application::STARTUP_FAILED))?;
    app.run()
        .await
        .inspect_err(|e| error!(error = %e, "{}", log_messages::application::STARTUP_FAILED))?;

    Ok(())
}
