//! Error types for tally storage.

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// No account exists for the given ID.
    #[error("account not found: {account_id}")]
    AccountNotFound {
        /// The account ID that was looked up.
        account_id: String,
    },

    /// No subscription record exists for the given provider reference.
    #[error("subscription not found: {subscription_ref}")]
    SubscriptionNotFound {
        /// The provider subscription reference that was looked up.
        subscription_ref: String,
    },

    /// Insufficient credits for a spend.
    #[error("insufficient credits: remaining={remaining}, required={required}")]
    InsufficientCredits {
        /// Credits remaining on the account.
        remaining: i64,
        /// Credits the spend required.
        required: i64,
    },

    /// Spend amount must be positive.
    #[error("invalid spend amount: {credits}")]
    InvalidSpend {
        /// The rejected amount.
        credits: i64,
    },

    /// A transaction kept conflicting after bounded retries; safe to retry
    /// from the caller.
    #[error("transaction conflict: {0}")]
    Conflict(String),
}

impl StoreError {
    /// Whether retrying the failed operation can succeed without any other
    /// change in the system.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::Database(_))
    }
}
