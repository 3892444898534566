//! Key encoding utilities for `RocksDB`.
//!
//! This module provides functions for encoding and decoding keys used in column families.

use tally_core::{AccountId, EntryId};

/// Create an account key from an account ID.
#[must_use]
pub fn account_key(account_id: &AccountId) -> Vec<u8> {
    account_id.as_bytes().to_vec()
}

/// Create a spend-entry key from an entry ID.
#[must_use]
pub fn spend_entry_key(entry_id: &EntryId) -> Vec<u8> {
    entry_id.to_bytes().to_vec()
}

/// Create an account-spend index key.
///
/// Format: `account_id (16 bytes) || entry_id (16 bytes)`
///
/// Since ULIDs are time-ordered, an account's spend entries sort by time.
#[must_use]
pub fn account_spend_key(account_id: &AccountId, entry_id: &EntryId) -> Vec<u8> {
    let mut key = Vec::with_capacity(32);
    key.extend_from_slice(account_id.as_bytes());
    key.extend_from_slice(&entry_id.to_bytes());
    key
}

/// Create a prefix for iterating all spend entries for an account.
#[must_use]
pub fn account_spends_prefix(account_id: &AccountId) -> Vec<u8> {
    account_id.as_bytes().to_vec()
}

/// Extract the entry ID from an account-spend index key.
///
/// # Panics
///
/// Panics if the key is not at least 32 bytes.
#[must_use]
pub fn extract_entry_id_from_account_key(key: &[u8]) -> EntryId {
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&key[16..32]);
    EntryId::from_bytes(bytes).expect("valid ULID bytes")
}

/// Create a subscription key from the provider's subscription reference.
#[must_use]
pub fn subscription_key(subscription_ref: &str) -> Vec<u8> {
    subscription_ref.as_bytes().to_vec()
}

/// Create a processed-event key from an event ID.
#[must_use]
pub fn processed_event_key(event_id: &str) -> Vec<u8> {
    event_id.as_bytes().to_vec()
}
