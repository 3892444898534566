//! Account registration and ledger handlers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use tally_core::{Account, AccountId, SpendEntry};
use tally_store::Store;

use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Account registration request.
#[derive(Debug, Deserialize)]
pub struct RegisterAccountRequest {
    /// Account ID assigned by the identity layer.
    pub account_id: String,
    /// Billing provider customer reference (optional).
    pub billing_customer_ref: Option<String>,
}

/// Account snapshot response.
#[derive(Debug, Serialize)]
pub struct AccountResponse {
    /// Account ID.
    pub account_id: String,
    /// Current tier.
    pub tier: String,
    /// Current subscription status.
    pub subscription_status: String,
    /// Credits remaining in the current period.
    pub credits_remaining: i64,
    /// Credit limit for the current tier.
    pub credit_limit: i64,
    /// Billing provider customer reference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_customer_ref: Option<String>,
    /// Creation timestamp.
    pub created_at: String,
    /// Last update timestamp.
    pub updated_at: String,
}

impl From<&Account> for AccountResponse {
    fn from(account: &Account) -> Self {
        Self {
            account_id: account.account_id.to_string(),
            tier: account.tier.as_str().to_string(),
            subscription_status: account.subscription_status.as_str().to_string(),
            credits_remaining: account.credits_remaining,
            credit_limit: account.credit_limit,
            billing_customer_ref: account.billing_customer_ref.clone(),
            created_at: account.created_at.to_rfc3339(),
            updated_at: account.updated_at.to_rfc3339(),
        }
    }
}

/// Register an account in the ledger.
///
/// Idempotent: re-registering an existing account returns the stored row
/// unchanged.
pub async fn register_account(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Json(body): Json<RegisterAccountRequest>,
) -> Result<Json<AccountResponse>, ApiError> {
    let account_id = parse_account_id(&body.account_id)?;

    if let Some(existing) = state.store.get_account(&account_id)? {
        return Ok(Json(AccountResponse::from(&existing)));
    }

    let mut account = Account::new(account_id);
    account.credit_limit = state.config.free_tier_credits;
    account.credits_remaining = state.config.free_tier_credits;
    account.billing_customer_ref = body.billing_customer_ref;

    state.store.put_account(&account)?;

    tracing::info!(
        account_id = %account_id,
        service = %auth.service_name,
        credits = %account.credits_remaining,
        "Account registered"
    );

    Ok(Json(AccountResponse::from(&account)))
}

/// Get an account snapshot.
pub async fn get_account(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(account_id): Path<String>,
) -> Result<Json<AccountResponse>, ApiError> {
    let account_id = parse_account_id(&account_id)?;

    let account = state
        .store
        .get_account(&account_id)?
        .ok_or_else(|| ApiError::NotFound(format!("Account not found: {account_id}")))?;

    Ok(Json(AccountResponse::from(&account)))
}

/// Ledger query parameters.
#[derive(Debug, Deserialize)]
pub struct LedgerQuery {
    /// Maximum number of entries to return (default: 50).
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Offset for pagination (default: 0).
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    50
}

/// Spend entry response.
#[derive(Debug, Serialize)]
pub struct SpendEntryResponse {
    /// Entry ID (time-ordered).
    pub entry_id: String,
    /// Action that consumed the credits.
    pub action_type: String,
    /// Credits deducted.
    pub credits_used: i64,
    /// Balance after the deduction.
    pub credits_remaining_after: i64,
    /// Caller-supplied metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    /// Timestamp.
    pub created_at: String,
}

impl From<&SpendEntry> for SpendEntryResponse {
    fn from(entry: &SpendEntry) -> Self {
        Self {
            entry_id: entry.entry_id.to_string(),
            action_type: entry.action_type.clone(),
            credits_used: entry.credits_used,
            credits_remaining_after: entry.credits_remaining_after,
            metadata: entry.metadata.clone(),
            created_at: entry.created_at.to_rfc3339(),
        }
    }
}

/// Ledger response: account snapshot plus recent spend entries.
#[derive(Debug, Serialize)]
pub struct LedgerResponse {
    /// Account snapshot.
    pub account: AccountResponse,
    /// Spend entries (newest first).
    pub entries: Vec<SpendEntryResponse>,
    /// Whether there are more entries.
    pub has_more: bool,
}

/// Get an account's balance and recent spend history.
pub async fn get_ledger(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(account_id): Path<String>,
    Query(query): Query<LedgerQuery>,
) -> Result<Json<LedgerResponse>, ApiError> {
    let account_id = parse_account_id(&account_id)?;

    let account = state
        .store
        .get_account(&account_id)?
        .ok_or_else(|| ApiError::NotFound(format!("Account not found: {account_id}")))?;

    // Fetch one more than requested to determine has_more
    let limit = query.limit.min(100);
    let entries = state
        .store
        .list_spends_by_account(&account_id, limit + 1, query.offset)?;

    let has_more = entries.len() > limit;
    let entries: Vec<_> = entries
        .iter()
        .take(limit)
        .map(SpendEntryResponse::from)
        .collect();

    Ok(Json(LedgerResponse {
        account: AccountResponse::from(&account),
        entries,
        has_more,
    }))
}

pub(crate) fn parse_account_id(raw: &str) -> Result<AccountId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid account ID: {raw}")))
}
