//! Application state.

use std::sync::Arc;

use tally_store::RocksStore;

use crate::config::ServiceConfig;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The storage backend.
    pub store: Arc<RocksStore>,

    /// Service configuration.
    pub config: ServiceConfig,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub fn new(store: Arc<RocksStore>, config: ServiceConfig) -> Self {
        if config.billing_webhook_secret.is_none() {
            tracing::warn!(
                "Billing webhook secret not configured - webhook deliveries will be rejected"
            );
        }
        if config.service_api_key.is_none() {
            tracing::warn!("Service API key not configured - spend endpoints will be rejected");
        }

        Self { store, config }
    }
}
