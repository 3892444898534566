//! Billing webhook integration tests.

mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use common::{invoice_event, subscription_event, TestHarness};

// ============================================================================
// Signature Verification
// ============================================================================

#[tokio::test]
async fn delivery_without_signature_is_rejected() {
    let harness = TestHarness::new();
    harness.register_account().await;

    let event = subscription_event(
        "evt_1",
        "subscription.created",
        "sub_1",
        &harness.test_account_id,
        "active",
        "Acme Premium Plan",
        Utc::now(),
    );

    let response = harness
        .server
        .post("/webhooks/billing")
        .text(event.to_string())
        .content_type("application/json")
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn badly_signed_delivery_changes_nothing() {
    let harness = TestHarness::new();
    harness.register_account().await;

    let event = subscription_event(
        "evt_1",
        "subscription.created",
        "sub_1",
        &harness.test_account_id,
        "active",
        "Acme Premium Plan",
        Utc::now(),
    );

    harness
        .deliver_event_badly_signed(&event)
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    // The forged refill must not have been applied.
    let account = harness.get_account().await;
    assert_eq!(account["tier"], "free");
    assert_eq!(account["credits_remaining"], 100);
}

#[tokio::test]
async fn unconfigured_secret_fails_closed() {
    let harness = TestHarness::without_webhook_secret();
    harness.register_account().await;

    let event = subscription_event(
        "evt_1",
        "subscription.created",
        "sub_1",
        &harness.test_account_id,
        "active",
        "Acme Premium Plan",
        Utc::now(),
    );

    // Signed or not, deliveries bounce until a secret is deployed.
    let response = harness.deliver_event(&event).await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);

    let account = harness.get_account().await;
    assert_eq!(account["tier"], "free");
}

// ============================================================================
// Subscription Events
// ============================================================================

#[tokio::test]
async fn activation_resolves_tier_and_refills() {
    let harness = TestHarness::new();
    harness.register_account().await;

    let event = subscription_event(
        "evt_1",
        "subscription.created",
        "sub_1",
        &harness.test_account_id,
        "active",
        "Acme Premium Plan",
        Utc::now(),
    );

    let response = harness.deliver_event(&event).await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["received"], true);
    assert_eq!(body["outcome"], "applied");

    let account = harness.get_account().await;
    assert_eq!(account["tier"], "premium");
    assert_eq!(account["credits_remaining"], 2000);
    assert_eq!(account["credit_limit"], 2000);
}

#[tokio::test]
async fn unknown_product_falls_back_to_basic() {
    let harness = TestHarness::new();
    harness.register_account().await;

    let event = subscription_event(
        "evt_1",
        "subscription.created",
        "sub_1",
        &harness.test_account_id,
        "active",
        "Mystery Box",
        Utc::now(),
    );

    harness.deliver_event(&event).await.assert_status_ok();

    let account = harness.get_account().await;
    assert_eq!(account["tier"], "basic");
    assert_eq!(account["credit_limit"], 500);
}

#[tokio::test]
async fn replayed_event_is_acked_without_reapplying() {
    let harness = TestHarness::new();
    harness.register_account().await;

    let event = subscription_event(
        "evt_1",
        "subscription.created",
        "sub_1",
        &harness.test_account_id,
        "active",
        "Acme Premium Plan",
        Utc::now(),
    );

    harness.deliver_event(&event).await.assert_status_ok();
    harness.spend(100).await.assert_status_ok();

    // Redelivery of the same event id: success, but no second refill.
    let response = harness.deliver_event(&event).await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["outcome"], "duplicate");

    let account = harness.get_account().await;
    assert_eq!(account["credits_remaining"], 1900);
}

#[tokio::test]
async fn stale_event_is_discarded() {
    let harness = TestHarness::new();
    harness.register_account().await;

    let now = Utc::now();
    let activation = subscription_event(
        "evt_newer",
        "subscription.created",
        "sub_1",
        &harness.test_account_id,
        "active",
        "Acme Premium Plan",
        now,
    );
    harness.deliver_event(&activation).await.assert_status_ok();

    // A deletion that happened before the activation arrives late.
    let late_deletion = subscription_event(
        "evt_older",
        "subscription.deleted",
        "sub_1",
        &harness.test_account_id,
        "canceled",
        "Acme Premium Plan",
        now - Duration::seconds(30),
    );
    let response = harness.deliver_event(&late_deletion).await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["outcome"], "stale");

    // The downgrade must not have fired.
    let account = harness.get_account().await;
    assert_eq!(account["tier"], "premium");
    assert_eq!(account["subscription_status"], "active");
    assert_eq!(account["credits_remaining"], 2000);
}

#[tokio::test]
async fn nonactive_update_only_tracks() {
    let harness = TestHarness::new();
    harness.register_account().await;

    let now = Utc::now();
    let activation = subscription_event(
        "evt_1",
        "subscription.created",
        "sub_1",
        &harness.test_account_id,
        "active",
        "Acme Premium Plan",
        now,
    );
    harness.deliver_event(&activation).await.assert_status_ok();
    harness.spend(500).await.assert_status_ok();

    // Provider flags the subscription past_due; the account itself is only
    // marked by invoice.payment_failed.
    let update = subscription_event(
        "evt_2",
        "subscription.updated",
        "sub_1",
        &harness.test_account_id,
        "past_due",
        "Acme Premium Plan",
        now + Duration::seconds(60),
    );
    let response = harness.deliver_event(&update).await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["outcome"], "applied");

    let account = harness.get_account().await;
    assert_eq!(account["subscription_status"], "active");
    assert_eq!(account["credits_remaining"], 1500);
}

#[tokio::test]
async fn deletion_downgrades_but_keeps_remaining_credits() {
    let harness = TestHarness::new();
    harness.register_account().await;

    let now = Utc::now();
    let activation = subscription_event(
        "evt_1",
        "subscription.created",
        "sub_1",
        &harness.test_account_id,
        "active",
        "Acme Premium Plan",
        now,
    );
    harness.deliver_event(&activation).await.assert_status_ok();
    harness.spend(600).await.assert_status_ok();

    let deletion = subscription_event(
        "evt_2",
        "subscription.deleted",
        "sub_1",
        &harness.test_account_id,
        "canceled",
        "Acme Premium Plan",
        now + Duration::seconds(60),
    );
    harness.deliver_event(&deletion).await.assert_status_ok();

    let account = harness.get_account().await;
    assert_eq!(account["tier"], "free");
    assert_eq!(account["subscription_status"], "canceled");
    assert_eq!(account["credit_limit"], 100);
    // Whatever was left keeps being spendable on the free tier.
    assert_eq!(account["credits_remaining"], 1400);
}

// ============================================================================
// Invoice Events
// ============================================================================

#[tokio::test]
async fn paid_invoice_refills_for_a_new_period() {
    let harness = TestHarness::new();
    harness.register_account().await;

    let now = Utc::now();
    let activation = subscription_event(
        "evt_1",
        "subscription.created",
        "sub_1",
        &harness.test_account_id,
        "active",
        "Acme Premium Plan",
        now,
    );
    harness.deliver_event(&activation).await.assert_status_ok();
    harness.spend(1200).await.assert_status_ok();

    // Next month's invoice settles: full fresh grant, nothing carried over.
    let invoice = invoice_event(
        "evt_2",
        "invoice.paid",
        "sub_1",
        Some("Acme Premium Plan"),
        now + Duration::days(30),
    );
    let response = harness.deliver_event(&invoice).await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["outcome"], "applied");

    let account = harness.get_account().await;
    assert_eq!(account["credits_remaining"], 2000);
}

#[tokio::test]
async fn paid_invoice_without_product_uses_stored_subscription() {
    let harness = TestHarness::new();
    harness.register_account().await;

    let now = Utc::now();
    let activation = subscription_event(
        "evt_1",
        "subscription.created",
        "sub_1",
        &harness.test_account_id,
        "active",
        "Acme Basic",
        now,
    );
    harness.deliver_event(&activation).await.assert_status_ok();
    harness.spend(200).await.assert_status_ok();

    let invoice = invoice_event(
        "evt_2",
        "invoice.paid",
        "sub_1",
        None,
        now + Duration::days(30),
    );
    harness.deliver_event(&invoice).await.assert_status_ok();

    let account = harness.get_account().await;
    assert_eq!(account["tier"], "basic");
    assert_eq!(account["credits_remaining"], 500);
}

#[tokio::test]
async fn invoice_for_unknown_subscription_retries_until_known() {
    let harness = TestHarness::new();
    harness.register_account().await;

    let now = Utc::now();
    let invoice = invoice_event("evt_inv", "invoice.paid", "sub_1", None, now);

    // Out-of-order arrival: the invoice lands before the subscription.
    let response = harness.deliver_event(&invoice).await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);

    let created = subscription_event(
        "evt_sub",
        "subscription.created",
        "sub_1",
        &harness.test_account_id,
        "incomplete",
        "Acme Premium Plan",
        now - Duration::seconds(5),
    );
    harness.deliver_event(&created).await.assert_status_ok();

    // Provider redelivery of the same invoice event now applies.
    let response = harness.deliver_event(&invoice).await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["outcome"], "applied");

    let account = harness.get_account().await;
    assert_eq!(account["tier"], "premium");
    assert_eq!(account["credits_remaining"], 2000);
}

#[tokio::test]
async fn failed_invoice_marks_past_due_and_keeps_balance() {
    let harness = TestHarness::new();
    harness.register_account().await;

    let now = Utc::now();
    let activation = subscription_event(
        "evt_1",
        "subscription.created",
        "sub_1",
        &harness.test_account_id,
        "active",
        "Acme Premium Plan",
        now,
    );
    harness.deliver_event(&activation).await.assert_status_ok();
    harness.spend(100).await.assert_status_ok();

    let failed = invoice_event(
        "evt_2",
        "invoice.payment_failed",
        "sub_1",
        None,
        now + Duration::days(30),
    );
    harness.deliver_event(&failed).await.assert_status_ok();

    let account = harness.get_account().await;
    assert_eq!(account["subscription_status"], "past_due");
    assert_eq!(account["tier"], "premium");
    assert_eq!(account["credits_remaining"], 1900);

    // Remaining credits keep working while the provider retries the card.
    harness.spend(50).await.assert_status_ok();
}

// ============================================================================
// Dispatch
// ============================================================================

#[tokio::test]
async fn unrecognized_event_type_is_acked_as_ignored() {
    let harness = TestHarness::new();

    let event = serde_json::json!({
        "id": "evt_1",
        "type": "customer.updated",
        "occurred_at": Utc::now().to_rfc3339(),
        "data": {}
    });

    let response = harness.deliver_event(&event).await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["received"], true);
    assert_eq!(body["outcome"], "ignored");
}

#[tokio::test]
async fn malformed_envelope_is_rejected() {
    let harness = TestHarness::new();

    let event = serde_json::json!({ "hello": "world" });

    let response = harness.deliver_event(&event).await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

// ============================================================================
// End-to-End Upgrade Flow
// ============================================================================

#[tokio::test]
async fn free_account_upgrade_after_denial() {
    let harness = TestHarness::new();
    harness.register_account().await;

    // Burn most of the free allowance, then get denied.
    harness.spend(95).await.assert_status_ok();
    harness
        .spend(8)
        .await
        .assert_status(StatusCode::PAYMENT_REQUIRED);

    // The customer subscribes; the provider settles the first invoice.
    let now = Utc::now();
    let created = subscription_event(
        "evt_sub",
        "subscription.created",
        "sub_1",
        &harness.test_account_id,
        "incomplete",
        "Acme Premium Plan",
        now,
    );
    harness.deliver_event(&created).await.assert_status_ok();

    let paid = invoice_event(
        "evt_inv",
        "invoice.paid",
        "sub_1",
        Some("Acme Premium Plan"),
        now + Duration::seconds(10),
    );
    harness.deliver_event(&paid).await.assert_status_ok();

    // The denied action now goes through.
    let response = harness.spend(8).await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["credits_remaining"], 1992);

    // A replayed invoice event must not grant a second refill.
    let replay = harness.deliver_event(&paid).await;
    replay.assert_status_ok();
    let replay_body: serde_json::Value = replay.json();
    assert_eq!(replay_body["outcome"], "duplicate");

    let account = harness.get_account().await;
    assert_eq!(account["credits_remaining"], 1992);
}
