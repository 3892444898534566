//! Database schema definitions and column families.
//!
//! This module defines the column families used in `RocksDB` storage.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Primary account records, keyed by `account_id`.
    pub const ACCOUNTS: &str = "accounts";

    /// Append-only spend log, keyed by `entry_id` (ULID).
    pub const SPEND_ENTRIES: &str = "spend_entries";

    /// Index: spend entries by account, keyed by `account_id || entry_id`.
    /// Value is empty (index only).
    pub const SPENDS_BY_ACCOUNT: &str = "spends_by_account";

    /// Subscription mirror records, keyed by the provider's `subscription_ref`.
    pub const SUBSCRIPTIONS: &str = "subscriptions";

    /// Applied billing events for idempotency, keyed by `event_id`.
    /// Values carry the processing timestamp for retention GC.
    pub const PROCESSED_EVENTS: &str = "processed_events";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::ACCOUNTS,
        cf::SPEND_ENTRIES,
        cf::SPENDS_BY_ACCOUNT,
        cf::SUBSCRIPTIONS,
        cf::PROCESSED_EVENTS,
    ]
}
