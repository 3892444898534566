//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store` trait.
//!
//! `RocksStore` opens an `OptimisticTransactionDB`: every compound operation
//! reads its keys with `get_for_update` and commits as one transaction, so a
//! concurrent writer on the same account row fails validation at commit and
//! the operation retries against fresh state. That is what makes the spend
//! path's check-then-decrement safe without any in-process locking.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, ErrorKind, IteratorMode, MultiThreaded,
    OptimisticTransactionDB, Options, Transaction,
};

use tally_core::{
    Account, AccountId, CreditGrant, EntryId, EventOutcome, InvoiceEffect, SpendEntry,
    SubscriptionEffect, SubscriptionRecord, SubscriptionStatus,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::{ProcessedEvent, Store};

type Db = OptimisticTransactionDB<MultiThreaded>;

/// Conflict retries before an operation surfaces as transient.
const MAX_TXN_RETRIES: u32 = 8;

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<Db>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = OptimisticTransactionDB::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Run `op` inside an optimistic transaction, retrying on commit
    /// conflicts up to `MAX_TXN_RETRIES` times.
    ///
    /// `op` must be safe to re-run from scratch: every retry gets a fresh
    /// transaction and re-reads its keys.
    fn with_txn<T>(&self, op: impl Fn(&Transaction<'_, Db>) -> Result<T>) -> Result<T> {
        let mut attempts: u32 = 0;
        loop {
            let txn = self.db.transaction();
            let value = op(&txn)?;
            match txn.commit() {
                Ok(()) => return Ok(value),
                Err(e) if is_conflict(&e) => {
                    attempts += 1;
                    if attempts > MAX_TXN_RETRIES {
                        return Err(StoreError::Conflict(e.to_string()));
                    }
                    tracing::debug!(attempts, "transaction conflict, retrying");
                }
                Err(e) => return Err(StoreError::Database(e.to_string())),
            }
        }
    }

    /// Read and lock a value inside a transaction.
    fn txn_get_for_update<T: serde::de::DeserializeOwned>(
        txn: &Transaction<'_, Db>,
        cf: &Arc<BoundColumnFamily<'_>>,
        key: &[u8],
    ) -> Result<Option<T>> {
        txn.get_for_update_cf(cf, key, true)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    /// Read a value inside a transaction without adding it to the
    /// validation set.
    fn txn_get<T: serde::de::DeserializeOwned>(
        txn: &Transaction<'_, Db>,
        cf: &Arc<BoundColumnFamily<'_>>,
        key: &[u8],
    ) -> Result<Option<T>> {
        txn.get_cf(cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    /// Write a serialized value inside a transaction.
    fn txn_put<T: serde::Serialize>(
        txn: &Transaction<'_, Db>,
        cf: &Arc<BoundColumnFamily<'_>>,
        key: &[u8],
        value: &T,
    ) -> Result<()> {
        txn.put_cf(cf, key, Self::serialize(value)?)
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    /// Test-and-set the processed marker for an event.
    ///
    /// Returns `false` if the event was already marked (already applied).
    fn txn_mark_event_if_new(
        txn: &Transaction<'_, Db>,
        cf: &Arc<BoundColumnFamily<'_>>,
        event_id: &str,
    ) -> Result<bool> {
        let key = keys::processed_event_key(event_id);
        let already = txn
            .get_for_update_cf(cf, &key, true)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .is_some();
        if already {
            return Ok(false);
        }
        let marker = ProcessedEvent {
            event_id: event_id.to_string(),
            processed_at: Utc::now(),
        };
        Self::txn_put(txn, cf, &key, &marker)?;
        Ok(true)
    }
}

fn is_conflict(e: &rocksdb::Error) -> bool {
    matches!(
        e.kind(),
        ErrorKind::Busy | ErrorKind::TryAgain | ErrorKind::TimedOut
    )
}

impl Store for RocksStore {
    // =========================================================================
    // Account Operations
    // =========================================================================

    fn put_account(&self, account: &Account) -> Result<()> {
        let cf = self.cf(cf::ACCOUNTS)?;
        let key = keys::account_key(&account.account_id);
        let value = Self::serialize(account)?;

        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn get_account(&self, account_id: &AccountId) -> Result<Option<Account>> {
        let cf = self.cf(cf::ACCOUNTS)?;
        let key = keys::account_key(account_id);

        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    // =========================================================================
    // Ledger Operations
    // =========================================================================

    fn spend(&self, entry: &SpendEntry) -> Result<i64> {
        if entry.credits_used <= 0 {
            return Err(StoreError::InvalidSpend {
                credits: entry.credits_used,
            });
        }

        self.with_txn(|txn| {
            let cf_accounts = self.cf(cf::ACCOUNTS)?;
            let cf_entries = self.cf(cf::SPEND_ENTRIES)?;
            let cf_index = self.cf(cf::SPENDS_BY_ACCOUNT)?;

            let account_key = keys::account_key(&entry.account_id);
            let mut account: Account =
                Self::txn_get_for_update(txn, &cf_accounts, &account_key)?.ok_or_else(|| {
                    StoreError::AccountNotFound {
                        account_id: entry.account_id.to_string(),
                    }
                })?;

            if account.credits_remaining < entry.credits_used {
                return Err(StoreError::InsufficientCredits {
                    remaining: account.credits_remaining,
                    required: entry.credits_used,
                });
            }

            account.credits_remaining -= entry.credits_used;
            account.updated_at = Utc::now();

            let mut finalized = entry.clone();
            finalized.credits_remaining_after = account.credits_remaining;

            Self::txn_put(txn, &cf_accounts, &account_key, &account)?;
            Self::txn_put(
                txn,
                &cf_entries,
                &keys::spend_entry_key(&finalized.entry_id),
                &finalized,
            )?;
            txn.put_cf(
                &cf_index,
                keys::account_spend_key(&entry.account_id, &finalized.entry_id),
                [],
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

            Ok(account.credits_remaining)
        })
    }

    fn reset_credits(&self, account_id: &AccountId, grant: &CreditGrant) -> Result<Account> {
        self.with_txn(|txn| {
            let cf_accounts = self.cf(cf::ACCOUNTS)?;
            let key = keys::account_key(account_id);

            let mut account: Account = Self::txn_get_for_update(txn, &cf_accounts, &key)?
                .ok_or_else(|| StoreError::AccountNotFound {
                    account_id: account_id.to_string(),
                })?;

            account.reset(grant);
            Self::txn_put(txn, &cf_accounts, &key, &account)?;

            Ok(account)
        })
    }

    fn get_spend_entry(&self, entry_id: &EntryId) -> Result<Option<SpendEntry>> {
        let cf = self.cf(cf::SPEND_ENTRIES)?;
        let key = keys::spend_entry_key(entry_id);

        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    fn list_spends_by_account(
        &self,
        account_id: &AccountId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<SpendEntry>> {
        let cf_index = self.cf(cf::SPENDS_BY_ACCOUNT)?;
        let prefix = keys::account_spends_prefix(account_id);

        let mut entries = Vec::new();
        let mut skipped = 0;

        let iter = self.db.iterator_cf(
            &cf_index,
            IteratorMode::From(&prefix, rocksdb::Direction::Forward),
        );

        // Collect all matching keys first (ULIDs are naturally time-ordered)
        let mut all_keys: Vec<Vec<u8>> = Vec::new();
        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;

            if !key.starts_with(&prefix) {
                break;
            }

            all_keys.push(key.to_vec());
        }

        // Reverse to get newest first
        all_keys.reverse();

        for key in all_keys {
            if skipped < offset {
                skipped += 1;
                continue;
            }

            if entries.len() >= limit {
                break;
            }

            let entry_id = keys::extract_entry_id_from_account_key(&key);
            if let Some(entry) = self.get_spend_entry(&entry_id)? {
                entries.push(entry);
            }
        }

        Ok(entries)
    }

    // =========================================================================
    // Subscription Operations
    // =========================================================================

    fn get_subscription(&self, subscription_ref: &str) -> Result<Option<SubscriptionRecord>> {
        let cf = self.cf(cf::SUBSCRIPTIONS)?;
        let key = keys::subscription_key(subscription_ref);

        self.db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    // =========================================================================
    // Processed-Event Operations
    // =========================================================================

    fn is_event_processed(&self, event_id: &str) -> Result<bool> {
        let cf = self.cf(cf::PROCESSED_EVENTS)?;
        let key = keys::processed_event_key(event_id);

        let exists = self
            .db
            .get_cf(&cf, key)
            .map_err(|e| StoreError::Database(e.to_string()))?
            .is_some();

        Ok(exists)
    }

    fn purge_processed_events(&self, older_than: DateTime<Utc>) -> Result<usize> {
        let cf = self.cf(cf::PROCESSED_EVENTS)?;

        let mut purged = 0;
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (key, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            let marker: ProcessedEvent = Self::deserialize(&value)?;

            if marker.processed_at < older_than {
                self.db
                    .delete_cf(&cf, &key)
                    .map_err(|e| StoreError::Database(e.to_string()))?;
                purged += 1;
            }
        }

        Ok(purged)
    }

    // =========================================================================
    // Compound Operations
    // =========================================================================

    fn apply_subscription_event(
        &self,
        event_id: &str,
        record: &SubscriptionRecord,
        effect: &SubscriptionEffect,
    ) -> Result<EventOutcome> {
        self.with_txn(|txn| {
            let cf_events = self.cf(cf::PROCESSED_EVENTS)?;
            let cf_subs = self.cf(cf::SUBSCRIPTIONS)?;
            let cf_accounts = self.cf(cf::ACCOUNTS)?;

            let sub_key = keys::subscription_key(&record.subscription_ref);
            let stored: Option<SubscriptionRecord> =
                Self::txn_get_for_update(txn, &cf_subs, &sub_key)?;

            // Staleness gate: strictly-older events are discarded unapplied
            // and unmarked, so the marker set stays "fully applied only".
            if let Some(ref prev) = stored {
                if !record.supersedes(prev) {
                    return Ok(EventOutcome::Stale);
                }
            }

            if !Self::txn_mark_event_if_new(txn, &cf_events, event_id)? {
                return Ok(EventOutcome::Duplicate);
            }

            let was_active = stored
                .as_ref()
                .is_some_and(|prev| prev.status == SubscriptionStatus::Active);

            Self::txn_put(txn, &cf_subs, &sub_key, record)?;

            match effect {
                SubscriptionEffect::RefillOnActivate(grant) => {
                    // The refill fires only on a transition into active.
                    if !was_active && record.status == SubscriptionStatus::Active {
                        let account_key = keys::account_key(&record.account_id);
                        let mut account: Account =
                            Self::txn_get_for_update(txn, &cf_accounts, &account_key)?.ok_or_else(
                                || StoreError::AccountNotFound {
                                    account_id: record.account_id.to_string(),
                                },
                            )?;
                        account.reset(grant);
                        Self::txn_put(txn, &cf_accounts, &account_key, &account)?;
                    }
                }
                SubscriptionEffect::Downgrade(grant) => {
                    let account_key = keys::account_key(&record.account_id);
                    let mut account: Account =
                        Self::txn_get_for_update(txn, &cf_accounts, &account_key)?.ok_or_else(
                            || StoreError::AccountNotFound {
                                account_id: record.account_id.to_string(),
                            },
                        )?;
                    account.downgrade(grant);
                    Self::txn_put(txn, &cf_accounts, &account_key, &account)?;
                }
                SubscriptionEffect::TrackOnly => {}
            }

            Ok(EventOutcome::Applied)
        })
    }

    fn apply_invoice_event(
        &self,
        event_id: &str,
        subscription_ref: &str,
        effect: &InvoiceEffect,
    ) -> Result<EventOutcome> {
        self.with_txn(|txn| {
            let cf_events = self.cf(cf::PROCESSED_EVENTS)?;
            let cf_subs = self.cf(cf::SUBSCRIPTIONS)?;
            let cf_accounts = self.cf(cf::ACCOUNTS)?;

            if !Self::txn_mark_event_if_new(txn, &cf_events, event_id)? {
                return Ok(EventOutcome::Duplicate);
            }

            let subscription: SubscriptionRecord =
                Self::txn_get(txn, &cf_subs, &keys::subscription_key(subscription_ref))?
                    .ok_or_else(|| StoreError::SubscriptionNotFound {
                        subscription_ref: subscription_ref.to_string(),
                    })?;

            let account_key = keys::account_key(&subscription.account_id);
            let mut account: Account =
                Self::txn_get_for_update(txn, &cf_accounts, &account_key)?.ok_or_else(|| {
                    StoreError::AccountNotFound {
                        account_id: subscription.account_id.to_string(),
                    }
                })?;

            match effect {
                InvoiceEffect::Refill(grant) => account.reset(grant),
                InvoiceEffect::MarkPastDue => account.set_status(SubscriptionStatus::PastDue),
            }

            Self::txn_put(txn, &cf_accounts, &account_key, &account)?;

            Ok(EventOutcome::Applied)
        })
    }
}
