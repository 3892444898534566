//! Account types for tally.
//!
//! This module defines the per-account ledger row: tier, subscription status,
//! and the credit balance mutated by spends and billing-event resets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::AccountId;

// ============================================================================
// Constants
// ============================================================================

/// Credit allowance for accounts with no paid subscription.
pub const FREE_TIER_CREDITS: i64 = 100;

/// Credit allowance for the basic tier.
pub const BASIC_TIER_CREDITS: i64 = 500;

/// Credit allowance for the premium tier.
pub const PREMIUM_TIER_CREDITS: i64 = 2000;

/// Credit allowance for the enterprise tier.
pub const ENTERPRISE_TIER_CREDITS: i64 = 10_000;

/// A credit ledger account for one subscriber.
///
/// The account row is the single source of truth for the balance: the usage
/// gate decrements it and the webhook processor resets it. A tier downgrade
/// may leave `credits_remaining` above `credit_limit`; the limit caps future
/// grants, not the balance already held.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// The account ID (from the identity service).
    pub account_id: AccountId,

    /// Current subscription tier.
    pub tier: Tier,

    /// Status of the account's subscription.
    pub subscription_status: SubscriptionStatus,

    /// Credits left to spend. Never negative.
    pub credits_remaining: i64,

    /// Credits granted per billing period. Always positive.
    pub credit_limit: i64,

    /// Customer reference at the external billing provider.
    pub billing_customer_ref: Option<String>,

    /// When the account was created.
    pub created_at: DateTime<Utc>,

    /// When the account was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a new free-tier account with a full allowance.
    #[must_use]
    pub fn new(account_id: AccountId) -> Self {
        let now = Utc::now();
        Self {
            account_id,
            tier: Tier::Free,
            subscription_status: SubscriptionStatus::Active,
            credits_remaining: FREE_TIER_CREDITS,
            credit_limit: FREE_TIER_CREDITS,
            billing_customer_ref: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if the account can cover a spend of `credits`.
    #[must_use]
    pub fn has_sufficient_credits(&self, credits: i64) -> bool {
        self.credits_remaining >= credits
    }

    /// Apply a grant as a full reset: tier, limit, and status from the grant,
    /// remaining refilled to the new limit.
    pub fn reset(&mut self, grant: &CreditGrant) {
        self.tier = grant.tier.clone();
        self.credit_limit = grant.credit_limit;
        self.credits_remaining = grant.credit_limit;
        self.subscription_status = grant.status.clone();
        self.updated_at = Utc::now();
    }

    /// Apply a grant as a downgrade: tier, limit, and status change but the
    /// remaining balance is left where it is.
    pub fn downgrade(&mut self, grant: &CreditGrant) {
        self.tier = grant.tier.clone();
        self.credit_limit = grant.credit_limit;
        self.subscription_status = grant.status.clone();
        self.updated_at = Utc::now();
    }

    /// Status-only change; credits are untouched.
    pub fn set_status(&mut self, status: SubscriptionStatus) {
        self.subscription_status = status;
        self.updated_at = Utc::now();
    }
}

/// Subscription tiers, ordered by allowance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// No paid subscription.
    Free,

    /// Basic tier: the default for any recognized paid product.
    Basic,

    /// Premium tier.
    Premium,

    /// Enterprise tier.
    Enterprise,
}

impl Tier {
    /// Get the standard credit allowance for this tier.
    #[must_use]
    pub const fn default_credit_limit(&self) -> i64 {
        match self {
            Self::Free => FREE_TIER_CREDITS,
            Self::Basic => BASIC_TIER_CREDITS,
            Self::Premium => PREMIUM_TIER_CREDITS,
            Self::Enterprise => ENTERPRISE_TIER_CREDITS,
        }
    }

    /// Get the tier name as used on the wire.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Basic => "basic",
            Self::Premium => "premium",
            Self::Enterprise => "enterprise",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status of a subscription, used both on the account row and on the
/// subscription mirror record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Subscription is active (also the status of free accounts in good standing).
    Active,

    /// In a trial period; not yet paid.
    Trialing,

    /// A payment failed; subscription is past due.
    PastDue,

    /// Subscription was canceled.
    Canceled,

    /// Created but initial payment has not completed.
    Incomplete,

    /// Deleted at the provider. Terminal; only used on subscription records.
    Ended,
}

impl SubscriptionStatus {
    /// Parse a provider status string, defaulting unknown values to
    /// `Incomplete` so new provider states degrade safely.
    #[must_use]
    pub fn from_provider(status: &str) -> Self {
        match status {
            "active" => Self::Active,
            "trialing" => Self::Trialing,
            "past_due" | "unpaid" => Self::PastDue,
            "canceled" | "cancelled" => Self::Canceled,
            _ => Self::Incomplete,
        }
    }

    /// Get the status name as used on the wire.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Trialing => "trialing",
            Self::PastDue => "past_due",
            Self::Canceled => "canceled",
            Self::Incomplete => "incomplete",
            Self::Ended => "ended",
        }
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The parameters of a credit reset or downgrade: which tier, how many
/// credits per period, and the resulting subscription status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditGrant {
    /// Tier to move the account to.
    pub tier: Tier,

    /// New per-period credit limit.
    pub credit_limit: i64,

    /// Subscription status to record on the account.
    pub status: SubscriptionStatus,
}

impl CreditGrant {
    /// Create a grant.
    #[must_use]
    pub const fn new(tier: Tier, credit_limit: i64, status: SubscriptionStatus) -> Self {
        Self {
            tier,
            credit_limit,
            status,
        }
    }

    /// The grant applied when a subscription is deleted: back to the free
    /// allowance, account marked canceled.
    #[must_use]
    pub const fn free_fallback() -> Self {
        Self::new(Tier::Free, FREE_TIER_CREDITS, SubscriptionStatus::Canceled)
    }
}
