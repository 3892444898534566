//! Client error types.

/// Errors that can occur when using the tally client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server returned an error response.
    #[error("API error: {code} - {message}")]
    Api {
        /// Error code.
        code: String,
        /// Error message.
        message: String,
        /// HTTP status code.
        status: u16,
    },

    /// Insufficient credits.
    #[error("insufficient credits: remaining={remaining}, required={required}")]
    InsufficientCredits {
        /// Credits currently remaining.
        remaining: i64,
        /// Credits the request needed.
        required: i64,
    },

    /// Account not found.
    #[error("account not found: {account_id}")]
    AccountNotFound {
        /// The account ID.
        account_id: String,
    },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl ClientError {
    /// Whether the caller can retry the request unchanged.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Api { status, .. } => *status == 503,
            _ => false,
        }
    }
}
