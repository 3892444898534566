//! API error types and responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unauthorized - missing or invalid credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// Forbidden - valid credentials but insufficient permissions.
    #[error("forbidden")]
    Forbidden,

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Bad request - invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Conflict - resource already exists or invalid state transition.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Insufficient credits.
    #[error("insufficient credits: remaining={remaining}, required={required}")]
    InsufficientCredits {
        /// Credits currently remaining.
        remaining: i64,
        /// Credits the request needed.
        required: i64,
    },

    /// The request cannot be completed right now; the caller should retry.
    #[error("retry later: {0}")]
    Retryable(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                self.to_string(),
                None,
            ),
            Self::Forbidden => (StatusCode::FORBIDDEN, "forbidden", self.to_string(), None),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone(), None),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone(), None),
            Self::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg.clone(), None),
            Self::InsufficientCredits {
                remaining,
                required,
            } => (
                StatusCode::PAYMENT_REQUIRED,
                "insufficient_credits",
                self.to_string(),
                Some(serde_json::json!({
                    "credits_remaining": remaining,
                    "credits_required": required
                })),
            ),
            Self::Retryable(msg) => {
                tracing::warn!(error = %msg, "Request failed transiently");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "retry_later",
                    "The request could not be completed, retry later".to_string(),
                    None,
                )
            }
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<tally_store::StoreError> for ApiError {
    fn from(err: tally_store::StoreError) -> Self {
        match err {
            tally_store::StoreError::AccountNotFound { account_id } => {
                Self::NotFound(format!("Account not found: {account_id}"))
            }
            tally_store::StoreError::SubscriptionNotFound { subscription_ref } => {
                Self::NotFound(format!("Subscription not found: {subscription_ref}"))
            }
            tally_store::StoreError::InsufficientCredits {
                remaining,
                required,
            } => Self::InsufficientCredits {
                remaining,
                required,
            },
            tally_store::StoreError::InvalidSpend { credits } => {
                Self::BadRequest(format!("credits must be positive, got {credits}"))
            }
            tally_store::StoreError::Conflict(msg) => Self::Retryable(msg),
            tally_store::StoreError::Database(msg)
            | tally_store::StoreError::Serialization(msg) => Self::Internal(msg),
        }
    }
}
