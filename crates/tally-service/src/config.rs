//! Service configuration.

use std::path::Path;

use tally_core::{TierPolicy, FREE_TIER_CREDITS};

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// Path to `RocksDB` data directory (default: "/data/tally").
    pub data_dir: String,

    /// Service API key for service-to-service auth.
    pub service_api_key: Option<String>,

    /// Admin API key for operator endpoints.
    pub admin_api_key: Option<String>,

    /// Shared secret for billing webhook signatures. Webhook deliveries are
    /// rejected while this is unset.
    pub billing_webhook_secret: Option<String>,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,

    /// Days to keep processed-event markers before garbage collection.
    pub event_retention_days: i64,

    /// Credits granted to accounts without a paid subscription.
    pub free_tier_credits: i64,

    /// Product-name to tier mapping.
    pub tier_policy: TierPolicy,
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            data_dir: std::env::var("DATA_DIR").unwrap_or_else(|_| "/data/tally".into()),
            service_api_key: std::env::var("SERVICE_API_KEY").ok(),
            admin_api_key: std::env::var("ADMIN_API_KEY").ok(),
            billing_webhook_secret: std::env::var("BILLING_WEBHOOK_SECRET").ok(),
            cors_origins: std::env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_body_bytes: std::env::var("MAX_BODY_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1024 * 1024), // 1MB
            request_timeout_seconds: std::env::var("REQUEST_TIMEOUT_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
            event_retention_days: std::env::var("EVENT_RETENTION_DAYS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
            free_tier_credits: std::env::var("FREE_TIER_CREDITS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(FREE_TIER_CREDITS),
            tier_policy: load_tier_policy(),
        }
    }
}

/// Load the tier policy from `TIER_POLICY_FILE`, falling back to the
/// built-in table.
fn load_tier_policy() -> TierPolicy {
    let Ok(path) = std::env::var("TIER_POLICY_FILE") else {
        return TierPolicy::default();
    };

    match load_policy_file(&path) {
        Ok(policy) => {
            tracing::info!(path = %path, "Loaded tier policy from file");
            policy
        }
        Err(e) => {
            tracing::warn!(path = %path, error = %e, "Failed to load tier policy, using built-in table");
            TierPolicy::default()
        }
    }
}

/// Load a tier policy from a JSON file.
fn load_policy_file(path: &str) -> Result<TierPolicy, std::io::Error> {
    let path = Path::new(path);
    if !path.exists() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Tier policy file not found",
        ));
    }
    let contents = std::fs::read_to_string(path)?;
    serde_json::from_str(&contents)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            data_dir: "/data/tally".into(),
            service_api_key: None,
            admin_api_key: None,
            billing_webhook_secret: None,
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
            event_retention_days: 30,
            free_tier_credits: FREE_TIER_CREDITS,
            tier_policy: TierPolicy::default(),
        }
    }
}
