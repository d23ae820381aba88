mod bootstrap;
mod health;
mod routes;

use std::time::Duration;

use anyhow::Result;
use cleanerio_core::config::{AppConfig, LoadOptions};
use tokio_util::sync::CancellationToken;

fn init_logging(config: &AppConfig) {
    use cleanerio_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // a missing .env is fine; the process environment still applies
    let _ = dotenvy::dotenv();

    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;

    let service = routes::router(routes::EnquiryState::new(
        app.agent_runtime.dispatcher(),
        app.shutdown.clone(),
    ))
    .merge(health::router(health::HealthState::new(
        app.agent_runtime.knowledge().document_count(),
        app.agent_runtime.knowledge().index().embedding_model.clone(),
    )));

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        "cleanerio-server listening"
    );

    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    axum::serve(listener, service)
        .with_graceful_shutdown(wait_for_shutdown(app.shutdown.clone(), grace))
        .await?;

    tracing::info!(
        event_name = "system.server.stopped",
        correlation_id = "shutdown",
        "cleanerio-server stopped"
    );
    Ok(())
}

/// Resolves on ctrl-c. In-flight enquiries get `grace` to finish before their
/// outstanding model calls are cancelled.
async fn wait_for_shutdown(shutdown: CancellationToken, grace: Duration) {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(
            event_name = "system.server.signal_error",
            correlation_id = "shutdown",
            error = %error,
            "could not listen for ctrl-c; shutting down"
        );
    }
    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        grace_secs = grace.as_secs(),
        "cleanerio-server stopping"
    );

    tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        shutdown.cancel();
    });
}
