//! Billing-event application vocabulary.
//!
//! The webhook processor decides *what* an event means (which effect) and the
//! store applies it atomically together with the idempotency mark and the
//! staleness check. These enums are that contract.

use serde::{Deserialize, Serialize};

use crate::CreditGrant;

/// Ledger effect of a subscription lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionEffect {
    /// Refill the account with this grant, but only if the stored
    /// subscription was not already active. This scopes credit refills to
    /// transitions into `active` so routine metadata edits never reset a
    /// balance.
    RefillOnActivate(CreditGrant),

    /// Move the account onto this grant without touching the remaining
    /// balance. Used when the subscription is deleted.
    Downgrade(CreditGrant),

    /// Update the subscription mirror only; the ledger row is untouched.
    TrackOnly,
}

/// Ledger effect of an invoice lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvoiceEffect {
    /// Unconditional refill: the recurring per-period credit grant.
    Refill(CreditGrant),

    /// Mark the account past due; credits are untouched.
    MarkPastDue,
}

/// What happened to an event once the store saw it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventOutcome {
    /// The event was new and its effects were committed.
    Applied,

    /// The event id had already been applied; nothing was re-executed.
    Duplicate,

    /// The event was older than already-applied state and was discarded.
    Stale,
}

impl EventOutcome {
    /// Outcome name as reported in webhook acknowledgements and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Duplicate => "duplicate",
            Self::Stale => "stale",
        }
    }
}

impl std::fmt::Display for EventOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_names() {
        assert_eq!(EventOutcome::Applied.as_str(), "applied");
        assert_eq!(EventOutcome::Duplicate.as_str(), "duplicate");
        assert_eq!(EventOutcome::Stale.as_str(), "stale");
    }

    #[test]
    fn outcome_serializes_snake_case() {
        let json = serde_json::to_string(&EventOutcome::Duplicate).unwrap();
        assert_eq!(json, "\"duplicate\"");
    }
}
