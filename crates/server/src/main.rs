//! Cloud cost optimizer server binary
//!
//! Serves the instance, recommendation, audit and usage endpoints plus
//! health and Prometheus metrics.

use anyhow::Result;
use cloudopt_server::{api, bootstrap, config::ServerConfig};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting cloudopt-server");

    let config = ServerConfig::load()?;
    info!(
        port = config.api_port,
        journal = ?config.journal_path,
        usage = ?config.usage_path,
        idle_threshold = config.idle_threshold,
        "Server configured"
    );

    let state = bootstrap(&config).await?;
    state
        .logger
        .log_startup(SERVER_VERSION, &format!("0.0.0.0:{}", config.api_port));

    let logger = state.logger.clone();
    let shutdown = async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
        logger.log_shutdown("SIGINT received");
    };

    api::serve(config.api_port, state, shutdown).await?;
    info!("Shut down");

    Ok(())
}
