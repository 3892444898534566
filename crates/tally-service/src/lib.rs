//! Tally HTTP API Service.
//!
//! This crate provides the HTTP API for the tally credit ledger, including:
//!
//! - Account registration and ledger queries
//! - Credit deduction for metered actions
//! - Billing provider webhooks (subscription and invoice events)
//!
//! # Authentication
//!
//! The service supports three authentication methods:
//!
//! 1. **Service API keys** - For service-to-service requests (spend, accounts)
//! 2. **Admin API key** - For operator endpoints (credit reset)
//! 3. **Webhook signatures** - HMAC-SHA256 verification of provider deliveries

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)] // Handlers must be async for routing

pub mod auth;
pub mod config;
pub mod crypto;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::ServiceConfig;
pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
