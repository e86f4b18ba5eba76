//! Coiny Fees Server - HTTP API for the blended fee service

use anyhow::{Context, Result};
use clap::Parser;
use coiny_fees_server::{
    cli::Cli,
    config::AppConfig,
    server::{create_app, run_server},
    sources::{FeeSource, SourceClient},
};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_filter.clone().into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .init();

    info!("Coiny Fees Server starting...");

    // Load configuration
    let mut config = match &cli.config {
        Some(path) => AppConfig::from_file(path),
        None => AppConfig::load(),
    }
    .context("Failed to load configuration")?;
    cli.apply(&mut config);

    if cli.test_mode {
        warn!("Running in test mode with mock fee sources");
    }

    info!("Configuration loaded:");
    info!("  Server: {}:{}", config.server.host, config.server.port);
    info!(
        "  Sources: {:?} (primary), {:?} (secondary)",
        config.sources.primary.kind, config.sources.secondary.kind
    );
    info!(
        "  Store: {:?} at {}",
        config.persistence.backend, config.persistence.data_directory
    );
    info!("  Refresh interval: {}s", config.cache.refresh_interval_secs);

    let service = Arc::new(
        config
            .build_service()
            .context("Failed to initialize fee service")?,
    );

    for source in [service.primary(), service.secondary()] {
        info!("Using fee source {}", source.id());

        if let SourceClient::BitcoinCore(client) = source {
            match client.test_connection().await {
                Ok(_) => info!("Successfully connected to Bitcoin Core"),
                Err(e) => {
                    error!("Failed to connect to Bitcoin Core: {}", e);
                    // Continue anyway - the other source may still answer
                }
            }
        }
    }

    // Spawn background publish task
    let interval_secs = config.scheduler.interval_secs;
    if interval_secs > 0 {
        let scheduled = service.clone();
        tokio::spawn(async move {
            if let Err(e) = scheduled.start(interval_secs).await {
                error!("Fee scheduler error: {}", e);
            }
        });
    } else {
        info!("Scheduler disabled, fees update on request only");
    }

    // Create and run HTTP server
    let app = create_app(service);

    run_server(app, config.server.host, config.server.port)
        .await
        .context("Failed to run HTTP server")?;

    info!("Coiny Fees Server shut down");

    Ok(())
}
