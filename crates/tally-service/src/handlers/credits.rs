//! Credit spend and reset handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use tally_core::{CreditGrant, SpendEntry, SubscriptionStatus, Tier};
use tally_store::Store;

use crate::auth::{AdminAuth, ServiceAuth};
use crate::error::ApiError;
use crate::handlers::accounts::{parse_account_id, AccountResponse};
use crate::state::AppState;

/// Spend request from services.
#[derive(Debug, Deserialize)]
pub struct SpendRequest {
    /// Account being charged.
    pub account_id: String,
    /// Action that consumes the credits (e.g. "report.export").
    pub action_type: String,
    /// Credits to deduct. Must be positive.
    pub credits: i64,
    /// Additional metadata stored with the ledger entry.
    pub metadata: Option<serde_json::Value>,
}

/// Spend response.
#[derive(Debug, Serialize)]
pub struct SpendResponse {
    /// Whether the deduction was applied.
    pub accepted: bool,
    /// Balance after the deduction.
    pub credits_remaining: i64,
    /// Ledger entry ID.
    pub entry_id: String,
}

/// Deduct credits from an account.
///
/// The deduction and its ledger entry commit atomically; a denial leaves
/// the account untouched and carries the current balance in the error body.
pub async fn spend(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Json(body): Json<SpendRequest>,
) -> Result<Json<SpendResponse>, ApiError> {
    tracing::debug!(
        service = %auth.service_name,
        account_id = %body.account_id,
        action_type = %body.action_type,
        credits = %body.credits,
        "Processing spend request"
    );

    if body.action_type.trim().is_empty() {
        return Err(ApiError::BadRequest("action_type must not be empty".into()));
    }

    let account_id = parse_account_id(&body.account_id)?;

    let entry = SpendEntry::new(account_id, body.action_type, body.credits, body.metadata);
    let credits_remaining = state.store.spend(&entry)?;

    tracing::info!(
        account_id = %account_id,
        entry_id = %entry.entry_id,
        credits = %entry.credits_used,
        credits_remaining = %credits_remaining,
        "Credits deducted"
    );

    Ok(Json(SpendResponse {
        accepted: true,
        credits_remaining,
        entry_id: entry.entry_id.to_string(),
    }))
}

/// Admin credit reset request.
#[derive(Debug, Deserialize)]
pub struct ResetCreditsRequest {
    /// Account to reset.
    pub account_id: String,
    /// Tier to place the account on.
    pub tier: Tier,
    /// Credit limit override (default: the tier's built-in limit).
    pub credit_limit: Option<i64>,
    /// Subscription status override (default: active).
    pub status: Option<SubscriptionStatus>,
}

/// Reset an account's credits to a full grant.
///
/// Operator escape hatch for provisioning and support; the webhook flow
/// performs the same reset through event application.
pub async fn reset_credits(
    State(state): State<Arc<AppState>>,
    _auth: AdminAuth,
    Json(body): Json<ResetCreditsRequest>,
) -> Result<Json<AccountResponse>, ApiError> {
    let account_id = parse_account_id(&body.account_id)?;

    let credit_limit = body
        .credit_limit
        .unwrap_or_else(|| body.tier.default_credit_limit());
    if credit_limit <= 0 {
        return Err(ApiError::BadRequest(format!(
            "credit_limit must be positive, got {credit_limit}"
        )));
    }

    let status = body.status.unwrap_or(SubscriptionStatus::Active);
    let grant = CreditGrant::new(body.tier.clone(), credit_limit, status);

    let account = state.store.reset_credits(&account_id, &grant)?;

    tracing::info!(
        account_id = %account_id,
        tier = %account.tier,
        credit_limit = %account.credit_limit,
        "Credits reset by operator"
    );

    Ok(Json(AccountResponse::from(&account)))
}
