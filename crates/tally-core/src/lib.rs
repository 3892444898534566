//! Core types for the tally credit ledger.
//!
//! This crate provides the foundational types used throughout tally:
//!
//! - **Identifiers**: `AccountId`, `EntryId`
//! - **Accounts**: `Account`, `Tier`, `SubscriptionStatus`, `CreditGrant`
//! - **Spend log**: `SpendEntry`
//! - **Subscriptions**: `SubscriptionRecord`
//! - **Events**: `SubscriptionEffect`, `InvoiceEffect`, `EventOutcome`
//! - **Tier policy**: `TierPolicy`, `TierRule`
//!
//! # Credits
//!
//! A credit is the abstract unit consumed per metered action. Balances are
//! stored as `i64` and never go negative; each tier refills to its credit
//! limit on billing-period boundaries.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod account;
pub mod event;
pub mod ids;
pub mod ledger;
pub mod subscription;
pub mod tier;

pub use account::{
    Account, CreditGrant, SubscriptionStatus, Tier, BASIC_TIER_CREDITS, ENTERPRISE_TIER_CREDITS,
    FREE_TIER_CREDITS, PREMIUM_TIER_CREDITS,
};
pub use event::{EventOutcome, InvoiceEffect, SubscriptionEffect};
pub use ids::{AccountId, EntryId, IdError};
pub use ledger::SpendEntry;
pub use subscription::SubscriptionRecord;
pub use tier::{TierPolicy, TierRule};
