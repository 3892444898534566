//! Append-only spend log types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AccountId, EntryId};

/// One audit record in the append-only spend log.
///
/// Entries are immutable once written. Together with the last reset baseline
/// they fully determine the account's remaining balance, which keeps the
/// ledger row auditable against the log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpendEntry {
    /// Unique, time-ordered entry ID.
    pub entry_id: EntryId,

    /// The account the credits were spent from.
    pub account_id: AccountId,

    /// Free-form tag naming the metered action (e.g. `"report.export"`).
    pub action_type: String,

    /// Credits consumed. Always positive.
    pub credits_used: i64,

    /// Balance immediately after this entry was applied. Filled in by the
    /// store inside the spend transaction.
    pub credits_remaining_after: i64,

    /// Caller-supplied context, stored verbatim.
    pub metadata: Option<serde_json::Value>,

    /// When the entry was written.
    pub created_at: DateTime<Utc>,
}

impl SpendEntry {
    /// Create a new spend entry for `credits_used` credits.
    ///
    /// `credits_remaining_after` starts at zero; the store sets the real
    /// value when the spend commits.
    #[must_use]
    pub fn new(
        account_id: AccountId,
        action_type: impl Into<String>,
        credits_used: i64,
        metadata: Option<serde_json::Value>,
    ) -> Self {
        Self {
            entry_id: EntryId::generate(),
            account_id,
            action_type: action_type.into(),
            credits_used,
            credits_remaining_after: 0,
            metadata,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_entry_carries_the_spend() {
        let account_id = AccountId::generate();
        let entry = SpendEntry::new(account_id, "report.export", 5, None);

        assert_eq!(entry.account_id, account_id);
        assert_eq!(entry.action_type, "report.export");
        assert_eq!(entry.credits_used, 5);
        assert_eq!(entry.credits_remaining_after, 0);
        assert!(entry.metadata.is_none());
    }

    #[test]
    fn entry_serde_roundtrip() {
        let entry = SpendEntry::new(
            AccountId::generate(),
            "search.query",
            1,
            Some(serde_json::json!({"query_len": 42})),
        );
        let json = serde_json::to_string(&entry).unwrap();
        let parsed: SpendEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.entry_id, entry.entry_id);
        assert_eq!(parsed.credits_used, 1);
        assert_eq!(parsed.metadata, entry.metadata);
    }
}
