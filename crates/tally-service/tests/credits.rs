//! Credit spend and reset integration tests.

mod common;

use axum::http::StatusCode;
use common::{TestHarness, ADMIN_API_KEY, SERVICE_API_KEY};
use serde_json::json;

// ============================================================================
// Spend
// ============================================================================

#[tokio::test]
async fn spend_deducts_credits() {
    let harness = TestHarness::new();
    harness.register_account().await;

    let response = harness.spend(30).await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["accepted"], true);
    assert_eq!(body["credits_remaining"], 70);
    assert!(body["entry_id"].as_str().is_some());
}

#[tokio::test]
async fn spend_denial_carries_remaining_balance() {
    let harness = TestHarness::new();
    harness.register_account().await;

    harness.spend(95).await.assert_status_ok();

    let response = harness.spend(8).await;
    response.assert_status(StatusCode::PAYMENT_REQUIRED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"]["code"], "insufficient_credits");
    assert_eq!(body["error"]["details"]["credits_remaining"], 5);
    assert_eq!(body["error"]["details"]["credits_required"], 8);

    // Denial must not touch the balance.
    let account = harness.get_account().await;
    assert_eq!(account["credits_remaining"], 5);
}

#[tokio::test]
async fn concurrent_spends_allow_exactly_one_winner() {
    let harness = TestHarness::new();
    harness.register_account().await;

    // Each request wants over half the limit, so only one can fit.
    let (r1, r2, r3, r4) = tokio::join!(
        harness.spend(51),
        harness.spend(51),
        harness.spend(51),
        harness.spend(51),
    );

    let results = [r1, r2, r3, r4];
    let successes = results
        .iter()
        .filter(|r| r.status_code() == StatusCode::OK)
        .count();
    let denials = results
        .iter()
        .filter(|r| r.status_code() == StatusCode::PAYMENT_REQUIRED)
        .count();

    assert_eq!(successes, 1);
    assert_eq!(denials, 3);

    let account = harness.get_account().await;
    assert_eq!(account["credits_remaining"], 49);
}

#[tokio::test]
async fn spend_rejects_nonpositive_credits() {
    let harness = TestHarness::new();
    harness.register_account().await;

    harness.spend(0).await.assert_status(StatusCode::BAD_REQUEST);
    harness.spend(-5).await.assert_status(StatusCode::BAD_REQUEST);

    let account = harness.get_account().await;
    assert_eq!(account["credits_remaining"], 100);
}

#[tokio::test]
async fn spend_unknown_account_not_found() {
    let harness = TestHarness::new();

    let response = harness.spend(10).await;

    response.assert_status_not_found();
}

#[tokio::test]
async fn spend_without_auth_fails() {
    let harness = TestHarness::new();
    harness.register_account().await;

    let response = harness
        .server
        .post("/v1/credits/spend")
        .json(&json!({
            "account_id": harness.test_account_id.to_string(),
            "action_type": "test.action",
            "credits": 1
        }))
        .await;

    response.assert_status_unauthorized();
}

#[tokio::test]
async fn spend_with_wrong_key_fails() {
    let harness = TestHarness::new();
    harness.register_account().await;

    let response = harness
        .server
        .post("/v1/credits/spend")
        .add_header("x-api-key", "not-the-key")
        .json(&json!({
            "account_id": harness.test_account_id.to_string(),
            "action_type": "test.action",
            "credits": 1
        }))
        .await;

    response.assert_status_unauthorized();
}

#[tokio::test]
async fn spend_records_metadata_in_ledger() {
    let harness = TestHarness::new();
    harness.register_account().await;

    harness
        .server
        .post("/v1/credits/spend")
        .add_header("x-api-key", SERVICE_API_KEY)
        .json(&json!({
            "account_id": harness.test_account_id.to_string(),
            "action_type": "report.export",
            "credits": 12,
            "metadata": { "report_id": "rpt_42" }
        }))
        .await
        .assert_status_ok();

    let response = harness
        .server
        .get(&format!("/v1/accounts/{}/ledger", harness.test_account_id))
        .add_header("x-api-key", SERVICE_API_KEY)
        .await;
    let body: serde_json::Value = response.json();
    let entry = &body["entries"][0];
    assert_eq!(entry["action_type"], "report.export");
    assert_eq!(entry["metadata"]["report_id"], "rpt_42");
}

// ============================================================================
// Admin Reset
// ============================================================================

#[tokio::test]
async fn admin_reset_refills_to_tier_limit() {
    let harness = TestHarness::new();
    harness.register_account().await;
    harness.spend(60).await.assert_status_ok();

    let response = harness
        .server
        .post("/v1/credits/reset")
        .add_header("x-api-key", ADMIN_API_KEY)
        .json(&json!({
            "account_id": harness.test_account_id.to_string(),
            "tier": "premium"
        }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["tier"], "premium");
    assert_eq!(body["credits_remaining"], 2000);
    assert_eq!(body["credit_limit"], 2000);
}

#[tokio::test]
async fn admin_reset_accepts_limit_override() {
    let harness = TestHarness::new();
    harness.register_account().await;

    let response = harness
        .server
        .post("/v1/credits/reset")
        .add_header("x-api-key", ADMIN_API_KEY)
        .json(&json!({
            "account_id": harness.test_account_id.to_string(),
            "tier": "basic",
            "credit_limit": 750
        }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["credit_limit"], 750);
    assert_eq!(body["credits_remaining"], 750);
}

#[tokio::test]
async fn admin_reset_rejects_service_key() {
    let harness = TestHarness::new();
    harness.register_account().await;

    let response = harness
        .server
        .post("/v1/credits/reset")
        .add_header("x-api-key", SERVICE_API_KEY)
        .json(&json!({
            "account_id": harness.test_account_id.to_string(),
            "tier": "premium"
        }))
        .await;

    response.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_reset_without_auth_fails() {
    let harness = TestHarness::new();
    harness.register_account().await;

    let response = harness
        .server
        .post("/v1/credits/reset")
        .json(&json!({
            "account_id": harness.test_account_id.to_string(),
            "tier": "premium"
        }))
        .await;

    response.assert_status_unauthorized();
}
