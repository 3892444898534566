//! Billing provider webhook handler.
//!
//! Deliveries are authenticated by an HMAC signature over the raw body,
//! deduplicated by event id, and applied through single store transactions.
//! The response body always tells the provider what happened to the event:
//! `applied`, `duplicate`, `stale` or `ignored`.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tally_core::{
    CreditGrant, EventOutcome, InvoiceEffect, SubscriptionEffect, SubscriptionRecord,
    SubscriptionStatus, Tier,
};
use tally_store::{Store, StoreError};

use crate::crypto;
use crate::error::ApiError;
use crate::handlers::accounts::parse_account_id;
use crate::state::AppState;

/// Signature header set by the billing provider.
pub const SIGNATURE_HEADER: &str = "x-billing-signature";

/// Billing event envelope.
#[derive(Debug, Deserialize)]
pub struct BillingEvent {
    /// Provider-assigned event ID (idempotency key).
    pub id: String,
    /// Event type.
    #[serde(rename = "type")]
    pub event_type: String,
    /// When the event occurred at the provider.
    pub occurred_at: DateTime<Utc>,
    /// Event data.
    #[serde(default)]
    pub data: EventData,
}

/// Event data container.
#[derive(Debug, Default, Deserialize)]
pub struct EventData {
    /// Subscription object, present on `subscription.*` events.
    pub subscription: Option<SubscriptionPayload>,
    /// Invoice object, present on `invoice.*` events.
    pub invoice: Option<InvoicePayload>,
}

/// Subscription object in the provider's shape.
#[derive(Debug, Deserialize)]
pub struct SubscriptionPayload {
    /// Provider subscription ID.
    pub id: String,
    /// Account the subscription belongs to.
    pub account_id: String,
    /// Provider status string.
    pub status: String,
    /// Subscribed product name (drives tier resolution).
    pub product_name: Option<String>,
    /// Current billing period start.
    pub current_period_start: Option<DateTime<Utc>>,
    /// Current billing period end.
    pub current_period_end: Option<DateTime<Utc>>,
    /// Whether the subscription ends at the period boundary.
    #[serde(default)]
    pub cancel_at_period_end: bool,
    /// Cancellation timestamp, if canceled.
    pub canceled_at: Option<DateTime<Utc>>,
    /// Trial start.
    pub trial_start: Option<DateTime<Utc>>,
    /// Trial end.
    pub trial_end: Option<DateTime<Utc>>,
}

/// Invoice object in the provider's shape.
#[derive(Debug, Deserialize)]
pub struct InvoicePayload {
    /// Provider invoice ID.
    pub id: String,
    /// Subscription the invoice bills.
    pub subscription_id: String,
    /// Billed product name (optional; falls back to the stored
    /// subscription's price reference).
    pub product_name: Option<String>,
}

/// Webhook acknowledgement.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    /// Whether the delivery was accepted.
    pub received: bool,
    /// What happened to the event.
    pub outcome: String,
}

/// Handle billing provider webhooks.
pub async fn billing_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<WebhookResponse>, ApiError> {
    // Fail closed: without a secret nothing can be verified, and the
    // provider should keep redelivering until the deployment is fixed.
    let Some(secret) = &state.config.billing_webhook_secret else {
        return Err(ApiError::Retryable(
            "billing webhook secret not configured".into(),
        ));
    };

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            tracing::warn!("Billing webhook delivery without signature");
            ApiError::BadRequest("Missing webhook signature".into())
        })?;

    if !crypto::verify_signature(secret, body.as_bytes(), signature) {
        tracing::warn!("Invalid billing webhook signature");
        return Err(ApiError::BadRequest("Invalid webhook signature".into()));
    }

    // Parse only after the body is authenticated.
    let event: BillingEvent =
        serde_json::from_str(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    tracing::info!(
        event_id = %event.id,
        event_type = %event.event_type,
        "Received billing event"
    );

    // Cheap duplicate short-circuit; the authoritative check is the
    // test-and-set inside each apply transaction.
    if state.store.is_event_processed(&event.id)? {
        return Ok(Json(WebhookResponse {
            received: true,
            outcome: EventOutcome::Duplicate.as_str().to_string(),
        }));
    }

    let outcome = match event.event_type.as_str() {
        "subscription.created" | "subscription.updated" => {
            handle_subscription_change(&state, &event).await?.as_str()
        }
        "subscription.deleted" => handle_subscription_deleted(&state, &event).await?.as_str(),
        "invoice.paid" => handle_invoice_paid(&state, &event).await?.as_str(),
        "invoice.payment_failed" => handle_invoice_payment_failed(&state, &event)
            .await?
            .as_str(),
        _ => {
            tracing::debug!(event_type = %event.event_type, "Unhandled billing event type");
            "ignored"
        }
    };

    tracing::info!(
        event_id = %event.id,
        event_type = %event.event_type,
        outcome = %outcome,
        "Billing event processed"
    );

    Ok(Json(WebhookResponse {
        received: true,
        outcome: outcome.to_string(),
    }))
}

/// Handle `subscription.created` and `subscription.updated`.
///
/// A transition into `active` resolves the tier from the product name and
/// refills the ledger; every other status change only updates the stored
/// subscription mirror.
async fn handle_subscription_change(
    state: &AppState,
    event: &BillingEvent,
) -> Result<EventOutcome, ApiError> {
    let payload = subscription_payload(event)?;
    let record = build_record(
        payload,
        SubscriptionStatus::from_provider(&payload.status),
        event.occurred_at,
    )?;

    let effect = if record.status == SubscriptionStatus::Active {
        let product = payload.product_name.as_deref().unwrap_or("");
        let (tier, credit_limit) = state.config.tier_policy.resolve(product);
        SubscriptionEffect::RefillOnActivate(CreditGrant::new(
            tier,
            credit_limit,
            SubscriptionStatus::Active,
        ))
    } else {
        SubscriptionEffect::TrackOnly
    };

    state
        .store
        .apply_subscription_event(&event.id, &record, &effect)
        .map_err(map_apply_error)
}

/// Handle `subscription.deleted`: the account drops to the free tier but
/// keeps whatever balance is left.
async fn handle_subscription_deleted(
    state: &AppState,
    event: &BillingEvent,
) -> Result<EventOutcome, ApiError> {
    let payload = subscription_payload(event)?;
    let mut record = build_record(payload, SubscriptionStatus::Ended, event.occurred_at)?;
    if record.canceled_at.is_none() {
        record.canceled_at = Some(event.occurred_at);
    }

    let grant = CreditGrant::new(
        Tier::Free,
        state.config.free_tier_credits,
        SubscriptionStatus::Canceled,
    );

    state
        .store
        .apply_subscription_event(&event.id, &record, &SubscriptionEffect::Downgrade(grant))
        .map_err(map_apply_error)
}

/// Handle `invoice.paid`: the per-period refill.
async fn handle_invoice_paid(
    state: &AppState,
    event: &BillingEvent,
) -> Result<EventOutcome, ApiError> {
    let payload = invoice_payload(event)?;

    let product = match &payload.product_name {
        Some(name) => name.clone(),
        None => state
            .store
            .get_subscription(&payload.subscription_id)?
            .and_then(|s| s.price_ref)
            .unwrap_or_default(),
    };
    let (tier, credit_limit) = state.config.tier_policy.resolve(&product);

    let effect = InvoiceEffect::Refill(CreditGrant::new(
        tier,
        credit_limit,
        SubscriptionStatus::Active,
    ));

    state
        .store
        .apply_invoice_event(&event.id, &payload.subscription_id, &effect)
        .map_err(map_apply_error)
}

/// Handle `invoice.payment_failed`: mark the account past due, keep the
/// balance so service degrades instead of cutting off mid-period.
async fn handle_invoice_payment_failed(
    state: &AppState,
    event: &BillingEvent,
) -> Result<EventOutcome, ApiError> {
    let payload = invoice_payload(event)?;

    state
        .store
        .apply_invoice_event(&event.id, &payload.subscription_id, &InvoiceEffect::MarkPastDue)
        .map_err(map_apply_error)
}

fn subscription_payload(event: &BillingEvent) -> Result<&SubscriptionPayload, ApiError> {
    event
        .data
        .subscription
        .as_ref()
        .ok_or_else(|| ApiError::BadRequest("Missing subscription payload".into()))
}

fn invoice_payload(event: &BillingEvent) -> Result<&InvoicePayload, ApiError> {
    event
        .data
        .invoice
        .as_ref()
        .ok_or_else(|| ApiError::BadRequest("Missing invoice payload".into()))
}

fn build_record(
    payload: &SubscriptionPayload,
    status: SubscriptionStatus,
    occurred_at: DateTime<Utc>,
) -> Result<SubscriptionRecord, ApiError> {
    let account_id = parse_account_id(&payload.account_id)?;

    Ok(SubscriptionRecord {
        subscription_ref: payload.id.clone(),
        account_id,
        status,
        price_ref: payload.product_name.clone(),
        current_period_start: payload.current_period_start,
        current_period_end: payload.current_period_end,
        cancel_at_period_end: payload.cancel_at_period_end,
        canceled_at: payload.canceled_at,
        trial_start: payload.trial_start,
        trial_end: payload.trial_end,
        last_event_at: occurred_at,
    })
}

/// Rows referenced by an event may not exist yet when deliveries arrive out
/// of order. Answer retryable so provider redelivery heals the gap.
fn map_apply_error(err: StoreError) -> ApiError {
    match err {
        StoreError::AccountNotFound { account_id } => {
            ApiError::Retryable(format!("account not yet known: {account_id}"))
        }
        StoreError::SubscriptionNotFound { subscription_ref } => {
            ApiError::Retryable(format!("subscription not yet known: {subscription_ref}"))
        }
        other => other.into(),
    }
}
