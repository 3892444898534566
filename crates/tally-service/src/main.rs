//! Tally Service - HTTP API for the usage-credit ledger
//!
//! This is the main entry point for the tally service.

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tally_service::{create_router, AppState, ServiceConfig};
use tally_store::{RocksStore, Store};

/// How often the processed-event retention sweep runs.
const PURGE_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tally=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Tally Service");

    // Load configuration from environment
    let config = ServiceConfig::from_env();

    tracing::info!(
        listen_addr = %config.listen_addr,
        data_dir = %config.data_dir,
        webhook_secret_configured = %config.billing_webhook_secret.is_some(),
        event_retention_days = %config.event_retention_days,
        "Service configuration loaded"
    );

    // Initialize RocksDB store
    tracing::info!(path = %config.data_dir, "Opening RocksDB store");
    let store = Arc::new(RocksStore::open(&config.data_dir)?);

    // Periodically drop processed-event markers past the retention window
    spawn_event_purge_task(Arc::clone(&store), config.event_retention_days);

    // Build app state
    let state = AppState::new(store, config.clone());

    // Create the router
    let app = create_router(state);
    tracing::info!("Router configured with all API endpoints");

    // Start HTTP server
    tracing::info!(listen_addr = %config.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Spawn the background task that garbage-collects processed-event markers.
fn spawn_event_purge_task(store: Arc<RocksStore>, retention_days: i64) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PURGE_INTERVAL);
        loop {
            interval.tick().await;
            let cutoff = chrono::Utc::now() - chrono::Duration::days(retention_days);
            match store.purge_processed_events(cutoff) {
                Ok(0) => {}
                Ok(purged) => {
                    tracing::info!(purged, "Expired processed-event markers removed");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Processed-event purge failed");
                }
            }
        }
    });
}
