//! `RocksDB` storage layer for tally.
//!
//! This crate provides persistent storage for accounts, the append-only spend
//! log, subscription mirror records, and applied billing events, using
//! `RocksDB` with column families for efficient indexing.
//!
//! # Architecture
//!
//! The storage uses the following column families:
//!
//! - `accounts`: Primary account records, keyed by `account_id`
//! - `spend_entries`: Spend log entries, keyed by `entry_id` (ULID)
//! - `spends_by_account`: Index for listing spend entries by account
//! - `subscriptions`: Subscription mirrors, keyed by `subscription_ref`
//! - `processed_events`: Applied billing events for idempotency, keyed by `event_id`
//!
//! All multi-key mutations run inside optimistic transactions so a spend, a
//! reset, and a billing-event application each commit or fail as a unit, and
//! two writers racing on one account row cannot both win.
//!
//! # Example
//!
//! ```no_run
//! use tally_store::{RocksStore, Store};
//! use tally_core::{Account, AccountId};
//!
//! let store = RocksStore::open("/tmp/tally-db").unwrap();
//!
//! // Create an account
//! let account_id = AccountId::generate();
//! let account = Account::new(account_id);
//! store.put_account(&account).unwrap();
//!
//! // Read it back
//! let retrieved = store.get_account(&account_id).unwrap();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod rocks;
pub mod schema;

pub use error::{Result, StoreError};
pub use rocks::RocksStore;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tally_core::{
    Account, AccountId, CreditGrant, EntryId, EventOutcome, InvoiceEffect, SpendEntry,
    SubscriptionEffect, SubscriptionRecord,
};

/// Marker stored for each fully-applied billing event.
///
/// The key is the event ID; the timestamp is what the retention sweep uses to
/// expire old markers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedEvent {
    /// The billing event ID that was applied.
    pub event_id: String,

    /// When the event's effects were committed.
    pub processed_at: DateTime<Utc>,
}

/// The storage trait defining all database operations.
///
/// This trait abstracts the storage layer, allowing for different implementations
/// (e.g., `RocksDB`, in-memory for testing).
pub trait Store: Send + Sync {
    // =========================================================================
    // Account Operations
    // =========================================================================

    /// Insert or update an account record.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_account(&self, account: &Account) -> Result<()>;

    /// Get an account by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_account(&self, account_id: &AccountId) -> Result<Option<Account>>;

    // =========================================================================
    // Ledger Operations
    // =========================================================================

    /// Spend credits: check the balance, decrement it, and append the entry,
    /// all in one transaction against the account row.
    ///
    /// Returns the remaining balance after the spend. The written entry's
    /// `credits_remaining_after` is set to the same value.
    ///
    /// # Errors
    ///
    /// - `StoreError::InvalidSpend` if `entry.credits_used` is not positive.
    /// - `StoreError::AccountNotFound` if the account doesn't exist.
    /// - `StoreError::InsufficientCredits` if the balance is too low; nothing
    ///   is written.
    /// - `StoreError::Conflict` if the transaction kept losing to concurrent
    ///   writers after bounded retries.
    fn spend(&self, entry: &SpendEntry) -> Result<i64>;

    /// Reset the account onto a grant: tier, limit, and status from the
    /// grant, remaining refilled to the new limit. Atomic with respect to
    /// concurrent spends.
    ///
    /// Returns the updated account.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::AccountNotFound` if the account doesn't exist.
    fn reset_credits(&self, account_id: &AccountId, grant: &CreditGrant) -> Result<Account>;

    /// Get a spend entry by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_spend_entry(&self, entry_id: &EntryId) -> Result<Option<SpendEntry>>;

    /// List spend entries for an account, ordered by time (newest first).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_spends_by_account(
        &self,
        account_id: &AccountId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<SpendEntry>>;

    // =========================================================================
    // Subscription Operations
    // =========================================================================

    /// Get the subscription mirror for a provider reference.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_subscription(&self, subscription_ref: &str) -> Result<Option<SubscriptionRecord>>;

    // =========================================================================
    // Processed-Event Operations (idempotency)
    // =========================================================================

    /// Check whether a billing event has already been applied.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn is_event_processed(&self, event_id: &str) -> Result<bool>;

    /// Delete processed-event markers older than `older_than`.
    ///
    /// Returns the number of markers removed. Providers stop redelivering
    /// well inside the retention window, so expiring markers does not reopen
    /// the replay hole.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn purge_processed_events(&self, older_than: DateTime<Utc>) -> Result<usize>;

    // =========================================================================
    // Compound Operations (billing-event application)
    // =========================================================================

    /// Apply a subscription lifecycle event: idempotency test-and-set,
    /// staleness check against the stored mirror, mirror replacement, and the
    /// ledger effect, all in one transaction.
    ///
    /// A `RefillOnActivate` effect resets the account only when the stored
    /// mirror was not already active and the incoming record is; a
    /// `Downgrade` always applies its grant without touching the remaining
    /// balance. Stale and duplicate events write nothing.
    ///
    /// # Errors
    ///
    /// - `StoreError::AccountNotFound` if the effect needs an account that
    ///   doesn't exist (nothing is written, the event stays unmarked).
    /// - `StoreError::Conflict` after bounded retries.
    fn apply_subscription_event(
        &self,
        event_id: &str,
        record: &SubscriptionRecord,
        effect: &SubscriptionEffect,
    ) -> Result<EventOutcome>;

    /// Apply an invoice lifecycle event against the account owning
    /// `subscription_ref`: idempotency test-and-set plus the ledger effect in
    /// one transaction.
    ///
    /// # Errors
    ///
    /// - `StoreError::SubscriptionNotFound` if no mirror exists for the
    ///   reference (the event stays unmarked so redelivery can succeed once
    ///   the subscription is known).
    /// - `StoreError::AccountNotFound` if the mirror points at a missing
    ///   account.
    /// - `StoreError::Conflict` after bounded retries.
    fn apply_invoice_event(
        &self,
        event_id: &str,
        subscription_ref: &str,
        effect: &InvoiceEffect,
    ) -> Result<EventOutcome>;
}
