//! AgentFlow - HTTP Server Entry Point
//!
//! Starts the HTTP server that exposes agent runs and workflow execution.

use agentflow::{api, config::Config};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agentflow=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!(
        "Loaded configuration: model={}, endpoint={}, max_steps={}",
        config.default_model, config.base_url, config.max_steps
    );
    if !config.smtp.is_complete() {
        info!("SMTP is not fully configured; email sends will fail until AGENTFLOW_SMTP_* is set");
    }

    api::serve(config).await?;

    Ok(())
}
