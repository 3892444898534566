//! Common test utilities for tally integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;

use axum::Router;
use axum_test::{TestResponse, TestServer};
use chrono::{DateTime, Utc};
use serde_json::json;
use tempfile::TempDir;

use tally_core::AccountId;
use tally_service::{create_router, crypto, AppState, ServiceConfig};
use tally_store::RocksStore;

/// Service API key used by every harness.
pub const SERVICE_API_KEY: &str = "test-service-key";

/// Admin API key used by every harness.
pub const ADMIN_API_KEY: &str = "test-admin-key";

/// Webhook signing secret used by every harness.
pub const WEBHOOK_SECRET: &str = "whsec_test";

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// Temporary directory for the database (kept alive for test duration).
    pub _temp_dir: TempDir,
    /// A test account ID for requests.
    pub test_account_id: AccountId,
}

impl TestHarness {
    /// Create a new test harness with a fresh database.
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Create a harness without a webhook secret, for fail-closed tests.
    pub fn without_webhook_secret() -> Self {
        Self::with_config(|config| {
            config.billing_webhook_secret = None;
        })
    }

    /// Create a harness with the default config adjusted by `adjust`.
    pub fn with_config(adjust: impl FnOnce(&mut ServiceConfig)) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = RocksStore::open(temp_dir.path()).expect("Failed to open store");

        let mut config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            data_dir: temp_dir.path().to_string_lossy().to_string(),
            service_api_key: Some(SERVICE_API_KEY.to_string()),
            admin_api_key: Some(ADMIN_API_KEY.to_string()),
            billing_webhook_secret: Some(WEBHOOK_SECRET.to_string()),
            ..ServiceConfig::default()
        };
        adjust(&mut config);

        let state = AppState::new(Arc::new(store), config);
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");
        let test_account_id = AccountId::generate();

        Self {
            server,
            _temp_dir: temp_dir,
            test_account_id,
        }
    }

    /// Register the harness account through the API and return the snapshot.
    pub async fn register_account(&self) -> serde_json::Value {
        let response = self
            .server
            .post("/v1/accounts")
            .add_header("x-api-key", SERVICE_API_KEY)
            .json(&json!({ "account_id": self.test_account_id.to_string() }))
            .await;
        response.assert_status_ok();
        response.json()
    }

    /// Fetch the harness account snapshot.
    pub async fn get_account(&self) -> serde_json::Value {
        let response = self
            .server
            .get(&format!("/v1/accounts/{}", self.test_account_id))
            .add_header("x-api-key", SERVICE_API_KEY)
            .await;
        response.assert_status_ok();
        response.json()
    }

    /// Spend credits on the harness account.
    pub async fn spend(&self, credits: i64) -> TestResponse {
        self.spend_as(&self.test_account_id.to_string(), credits).await
    }

    /// Spend credits on an arbitrary account id.
    pub async fn spend_as(&self, account_id: &str, credits: i64) -> TestResponse {
        self.server
            .post("/v1/credits/spend")
            .add_header("x-api-key", SERVICE_API_KEY)
            .json(&json!({
                "account_id": account_id,
                "action_type": "test.action",
                "credits": credits
            }))
            .await
    }

    /// Deliver a correctly signed billing event.
    pub async fn deliver_event(&self, event: &serde_json::Value) -> TestResponse {
        let body = event.to_string();
        let signature = crypto::hmac_sha256_hex(WEBHOOK_SECRET, body.as_bytes());
        self.server
            .post("/webhooks/billing")
            .add_header("x-billing-signature", signature)
            .text(body)
            .content_type("application/json")
            .await
    }

    /// Deliver an event signed with the wrong secret.
    pub async fn deliver_event_badly_signed(&self, event: &serde_json::Value) -> TestResponse {
        let body = event.to_string();
        let signature = crypto::hmac_sha256_hex("wrong-secret", body.as_bytes());
        self.server
            .post("/webhooks/billing")
            .add_header("x-billing-signature", signature)
            .text(body)
            .content_type("application/json")
            .await
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a `subscription.*` event payload.
pub fn subscription_event(
    event_id: &str,
    event_type: &str,
    subscription_ref: &str,
    account_id: &AccountId,
    status: &str,
    product_name: &str,
    occurred_at: DateTime<Utc>,
) -> serde_json::Value {
    json!({
        "id": event_id,
        "type": event_type,
        "occurred_at": occurred_at.to_rfc3339(),
        "data": {
            "subscription": {
                "id": subscription_ref,
                "account_id": account_id.to_string(),
                "status": status,
                "product_name": product_name
            }
        }
    })
}

/// Build an `invoice.*` event payload.
pub fn invoice_event(
    event_id: &str,
    event_type: &str,
    subscription_ref: &str,
    product_name: Option<&str>,
    occurred_at: DateTime<Utc>,
) -> serde_json::Value {
    let mut invoice = json!({
        "id": format!("in_{event_id}"),
        "subscription_id": subscription_ref
    });
    if let Some(name) = product_name {
        invoice["product_name"] = json!(name);
    }

    json!({
        "id": event_id,
        "type": event_type,
        "occurred_at": occurred_at.to_rfc3339(),
        "data": { "invoice": invoice }
    })
}
