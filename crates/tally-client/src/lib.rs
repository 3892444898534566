//! Tally Client SDK.
//!
//! This crate provides a client library for services to interact with the tally API.
//!
//! # Example
//!
//! ```no_run
//! use tally_client::TallyClient;
//! use tally_core::AccountId;
//!
//! # async fn example() -> Result<(), tally_client::ClientError> {
//! let client = TallyClient::new(
//!     "http://tally.billing-system.svc:8080",
//!     "your-service-api-key",
//! );
//!
//! // Deduct credits for a metered action
//! let account_id = AccountId::generate();
//! let response = client.spend_credits(&account_id, "report.export", 5).await?;
//!
//! println!("Credits remaining: {}", response.credits_remaining);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod client;
mod error;
mod types;

pub use client::{ClientOptions, TallyClient};
pub use error::ClientError;
pub use types::*;
