//! Exporter binary entry point.
//!
//! Wires configuration, the metric registry, the scrape task and the HTTP
//! server together. Core functionality lives in the `rollbar_exporter`
//! library crate.

use std::net::SocketAddr;

use clap::Parser;
use prometheus::Registry;
use rollbar_exporter::server::{create_router, AppState};
use rollbar_exporter::{Cli, ExporterMetrics, ProjectFilter, RollbarClient, Scraper};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());
    let settings = cli.into_settings()?;

    tracing::info!(
        port = settings.port,
        interval = ?settings.scrape_interval,
        max_items = settings.max_items,
        "rollbar exporter starting"
    );
    if settings.account_read_token.is_empty() {
        tracing::warn!("ROLLBAR_ACCOUNT_READ_TOKEN is empty, all scrapes will fail");
    }

    // Explicit registry shared by the scrape task and the /metrics endpoint.
    let registry = Registry::new();
    let metrics = ExporterMetrics::register(&registry)?;

    let client = RollbarClient::new(
        settings.account_read_token.clone(),
        settings.account_write_token.clone(),
    )?;
    let filter = ProjectFilter::new(
        settings.include_projects.clone(),
        settings.exclude_projects.clone(),
    );
    let scraper = Scraper::new(
        client,
        filter,
        metrics,
        settings.scrape_interval,
        settings.max_items,
    );

    // The scrape loop never terminates voluntarily; serving is unaffected by
    // scrape duration or failure.
    tokio::spawn(scraper.run());

    let app = create_router(AppState { registry });
    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("shutdown complete");
    Ok(())
}

/// Initialize tracing from `LOG_LEVEL`, falling back to a default filter.
fn init_tracing(log_level: Option<&str>) {
    let filter = log_level
        .map(tracing_subscriber::EnvFilter::new)
        .unwrap_or_else(|| tracing_subscriber::EnvFilter::new("info,rollbar_exporter=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Setup graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("received Ctrl+C signal");
        }
        _ = terminate => {
            tracing::info!("received terminate signal");
        }
    }
}
