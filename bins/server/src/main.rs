//! Docgate API Server
//!
//! Main entry point for the storage gateway and redaction service.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docgate_api::{AppState, create_router};
use docgate_core::redaction::{RedactionConfig, RedactionService};
use docgate_core::storage::{GatewayConfig, StorageGateway};
use docgate_shared::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docgate=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = AppConfig::load().context("Failed to load configuration")?;

    // Storage gateway
    let gateway = Arc::new(StorageGateway::new(&GatewayConfig::from(&config.storage)));
    if gateway.configured_providers().is_empty() {
        tracing::warn!("No storage providers configured; every storage call will fail");
    }

    // Redaction sessions
    let redaction_config = RedactionConfig::try_from(&config.redaction)
        .context("Invalid redaction configuration")?;
    let redaction = Arc::new(RedactionService::new(Arc::clone(&gateway), redaction_config));
    info!(
        session_ttl_secs = redaction_config.session_ttl.as_secs(),
        default_color = %redaction_config.default_color,
        "Redaction service configured"
    );

    spawn_upload_sweep(
        Arc::clone(&gateway),
        Duration::from_secs(config.storage.sweep_interval_secs.max(1)),
    );
    spawn_session_sweep(
        Arc::clone(&redaction),
        Duration::from_secs(config.redaction.sweep_interval_secs.max(1)),
    );

    // Create application state and router
    let state = AppState::new(gateway, redaction);
    let app = create_router(state, config.server.max_body_bytes);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Periodically abort chunked uploads that stopped receiving parts.
fn spawn_upload_sweep(gateway: Arc<StorageGateway>, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            gateway.sweep_idle_uploads().await;
        }
    });
}

/// Periodically evict redaction sessions past their idle window.
fn spawn_session_sweep(redaction: Arc<RedactionService>, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            redaction.sweep_expired();
        }
    });
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
