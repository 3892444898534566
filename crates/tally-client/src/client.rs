//! Tally HTTP client implementation.

use reqwest::Client;
use std::time::Duration;

use tally_core::AccountId;

use crate::error::ClientError;
use crate::types::{
    AccountSnapshot, ApiErrorResponse, LedgerSnapshot, RegisterAccountRequest, SpendRequest,
    SpendResponse,
};

/// Tally API client.
///
/// Provides methods for deducting credits and reading account ledgers.
#[derive(Debug, Clone)]
pub struct TallyClient {
    client: Client,
    base_url: String,
    api_key: String,
    service_name: String,
}

impl TallyClient {
    /// Create a new tally client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the tally service (e.g., `"http://tally:8080"`)
    /// * `api_key` - Service API key for authentication
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self::with_options(base_url, api_key, ClientOptions::default())
    }

    /// Create a new tally client with custom options.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built (should not happen with default settings).
    #[must_use]
    pub fn with_options(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        options: ClientOptions,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(options.timeout_seconds))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            service_name: options.service_name,
        }
    }

    /// Deduct credits for a metered action.
    ///
    /// This is a convenience method for the common case without metadata.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InsufficientCredits`] when the account cannot
    /// cover the deduction, or another error if the request fails.
    pub async fn spend_credits(
        &self,
        account_id: &AccountId,
        action_type: impl Into<String>,
        credits: i64,
    ) -> Result<SpendResponse, ClientError> {
        self.spend(SpendRequest {
            account_id: account_id.to_string(),
            action_type: action_type.into(),
            credits,
            metadata: None,
        })
        .await
    }

    /// Deduct credits with a full spend request.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn spend(&self, request: SpendRequest) -> Result<SpendResponse, ClientError> {
        let url = format!("{}/v1/credits/spend", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("x-service-name", &self.service_name)
            .json(&request)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Register an account in the ledger.
    ///
    /// Idempotent: re-registering an existing account returns the stored
    /// snapshot unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn register_account(
        &self,
        account_id: &AccountId,
        billing_customer_ref: Option<String>,
    ) -> Result<AccountSnapshot, ClientError> {
        let url = format!("{}/v1/accounts", self.base_url);
        let request = RegisterAccountRequest {
            account_id: account_id.to_string(),
            billing_customer_ref,
        };

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("x-service-name", &self.service_name)
            .json(&request)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Get an account snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::AccountNotFound`] for unknown accounts, or
    /// another error if the request fails.
    pub async fn get_account(&self, account_id: &AccountId) -> Result<AccountSnapshot, ClientError> {
        let url = format!("{}/v1/accounts/{account_id}", self.base_url);

        let response = self
            .client
            .get(&url)
            .header("x-api-key", &self.api_key)
            .header("x-service-name", &self.service_name)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Get an account's balance and recent spend history.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server returns an error.
    pub async fn get_ledger(
        &self,
        account_id: &AccountId,
        limit: usize,
        offset: usize,
    ) -> Result<LedgerSnapshot, ClientError> {
        let url = format!("{}/v1/accounts/{account_id}/ledger", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("limit", limit), ("offset", offset)])
            .header("x-api-key", &self.api_key)
            .header("x-service-name", &self.service_name)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Handle API response and convert errors.
    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();

        if status.is_success() {
            return Ok(response.json().await?);
        }

        // Try to parse error response
        let error_body: Result<ApiErrorResponse, _> = response.json().await;

        match error_body {
            Ok(api_error) => {
                let code = api_error.error.code.as_str();
                let message = api_error.error.message;

                // Map specific error codes to typed errors
                match code {
                    "insufficient_credits" => {
                        let remaining = api_error
                            .error
                            .details
                            .as_ref()
                            .and_then(|d| d.get("credits_remaining"))
                            .and_then(serde_json::Value::as_i64)
                            .unwrap_or(0);
                        let required = api_error
                            .error
                            .details
                            .as_ref()
                            .and_then(|d| d.get("credits_required"))
                            .and_then(serde_json::Value::as_i64)
                            .unwrap_or(0);

                        Err(ClientError::InsufficientCredits {
                            remaining,
                            required,
                        })
                    }
                    "not_found" if message.contains("Account") => {
                        Err(ClientError::AccountNotFound {
                            account_id: message.replace("Account not found: ", ""),
                        })
                    }
                    _ => Err(ClientError::Api {
                        code: code.to_string(),
                        message,
                        status: status.as_u16(),
                    }),
                }
            }
            Err(_) => Err(ClientError::Api {
                code: "unknown".to_string(),
                message: format!("HTTP {status}"),
                status: status.as_u16(),
            }),
        }
    }
}

/// Client options for customization.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Request timeout in seconds (default: 30).
    pub timeout_seconds: u64,
    /// Service name to include in requests.
    pub service_name: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            service_name: "unknown".to_string(),
        }
    }
}

impl ClientOptions {
    /// Create options with a service name.
    #[must_use]
    pub fn with_service_name(name: impl Into<String>) -> Self {
        Self {
            service_name: name.into(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_creation() {
        let client = TallyClient::new("http://localhost:8080", "test-api-key");
        assert_eq!(client.base_url, "http://localhost:8080");
    }

    #[test]
    fn client_trims_trailing_slash() {
        let client = TallyClient::new("http://localhost:8080/", "test-api-key");
        assert_eq!(client.base_url, "http://localhost:8080");
    }

    #[test]
    fn client_options() {
        let options = ClientOptions::with_service_name("reporting-api");
        let client = TallyClient::with_options("http://localhost:8080", "key", options);
        assert_eq!(client.service_name, "reporting-api");
    }
}
