//! Request and response types for the tally client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Spend request sent to the service.
#[derive(Debug, Clone, Serialize)]
pub struct SpendRequest {
    /// Account being charged.
    pub account_id: String,
    /// Action that consumes the credits.
    pub action_type: String,
    /// Credits to deduct.
    pub credits: i64,
    /// Additional metadata stored with the ledger entry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Spend response.
#[derive(Debug, Clone, Deserialize)]
pub struct SpendResponse {
    /// Whether the deduction was applied.
    pub accepted: bool,
    /// Balance after the deduction.
    pub credits_remaining: i64,
    /// Ledger entry ID.
    pub entry_id: String,
}

/// Account registration request.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterAccountRequest {
    /// Account ID assigned by the identity layer.
    pub account_id: String,
    /// Billing provider customer reference (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_customer_ref: Option<String>,
}

/// Account snapshot returned by the service.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountSnapshot {
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
    #[serde(default)]
    pub billing_customer_ref: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// A single ledger entry.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerEntry {
    /// Entry ID (time-ordered).
    pub entry_id: String,
    /// Action that consumed the credits.
    pub action_type: String,
    /// Credits deducted.
    pub credits_used: i64,
    /// Balance after the deduction.
    pub credits_remaining_after: i64,
    /// Caller-supplied metadata.
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    /// Timestamp.
    pub created_at: DateTime<Utc>,
}

/// Ledger response: account snapshot plus recent entries.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerSnapshot {
    /// Account snapshot.
    pub account: AccountSnapshot,
    /// Spend entries (newest first).
    pub entries: Vec<LedgerEntry>,
    /// Whether there are more entries.
    pub has_more: bool,
}

/// Error response body from the API.
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    /// The error payload.
    pub error: ApiErrorBody,
}

/// Error payload details.
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    /// Error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Structured details (e.g. remaining/required credits).
    #[serde(default)]
    pub details: Option<serde_json::Value>,
}
