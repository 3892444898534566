//! Durable mirror of the provider-owned subscription object.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccountId, SubscriptionStatus};

/// Mirror of one external subscription, keyed by the provider's reference.
///
/// The record tracks what the provider last told us, not what we wish were
/// true: it is replaced wholesale by each accepted event. `last_event_at`
/// carries the recency of that event and is what makes out-of-order webhook
/// delivery safe to discard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    /// The provider's subscription identifier.
    pub subscription_ref: String,

    /// The account this subscription belongs to.
    pub account_id: AccountId,

    /// Last reported subscription status.
    pub status: SubscriptionStatus,

    /// Product or price name from the provider, used for tier resolution.
    pub price_ref: Option<String>,

    /// Start of the current billing period.
    pub current_period_start: Option<DateTime<Utc>>,

    /// End of the current billing period.
    pub current_period_end: Option<DateTime<Utc>>,

    /// Whether the provider will cancel at period end.
    pub cancel_at_period_end: bool,

    /// When the subscription was canceled, if it was.
    pub canceled_at: Option<DateTime<Utc>>,

    /// Trial period start, if any.
    pub trial_start: Option<DateTime<Utc>>,

    /// Trial period end, if any.
    pub trial_end: Option<DateTime<Utc>>,

    /// `occurred_at` of the event that produced this record.
    pub last_event_at: DateTime<Utc>,
}

impl SubscriptionRecord {
    /// Whether this (incoming) record may replace `stored`.
    ///
    /// Events carrying the same timestamp as the stored record still apply;
    /// only strictly older ones are stale.
    #[must_use]
    pub fn supersedes(&self, stored: &Self) -> bool {
        self.last_event_at >= stored.last_event_at
    }
}
