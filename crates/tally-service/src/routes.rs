//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{accounts, credits, health, webhooks};
use crate::state::AppState;

// ============================================================================
// Concurrency Limiting Constants
// ============================================================================

/// Maximum concurrent requests for credit endpoints.
/// The spend path takes high-volume traffic from application backends.
const CREDITS_MAX_CONCURRENT_REQUESTS: usize = 100;

/// Maximum concurrent requests for general API endpoints.
const API_MAX_CONCURRENT_REQUESTS: usize = 50;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
///
/// ## Accounts (Service API Key auth)
/// - `POST /v1/accounts` - Register an account
/// - `GET /v1/accounts/:account_id` - Account snapshot
/// - `GET /v1/accounts/:account_id/ledger` - Balance + spend history
///
/// ## Credits (Service API Key auth, rate-limited; reset is admin-only)
/// - `POST /v1/credits/spend` - Deduct credits
/// - `POST /v1/credits/reset` - Reset credits to a full grant
///
/// ## Webhooks (Signature verification)
/// - `POST /webhooks/billing` - Billing provider events
pub fn create_router(state: AppState) -> Router {
    // Extract config values before moving state
    let cors_origins = state.config.cors_origins.clone();
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    // Build CORS layer
    let cors = build_cors_layer(&cors_origins);

    let state = Arc::new(state);

    // Create concurrency-limited credit routes
    // The spend endpoint sits on the hot path of every metered action, so
    // it gets its own, higher limit.
    let credit_routes = Router::new()
        .route("/spend", post(credits::spend))
        .route("/reset", post(credits::reset_credits))
        .layer(ConcurrencyLimitLayer::new(CREDITS_MAX_CONCURRENT_REQUESTS));

    // Create concurrency-limited API routes
    let api_routes = Router::new()
        // Accounts
        .route("/accounts", post(accounts::register_account))
        .route("/accounts/:account_id", get(accounts::get_account))
        .route("/accounts/:account_id/ledger", get(accounts::get_ledger))
        // Credits (with their own concurrency limit)
        .nest("/credits", credit_routes)
        .layer(ConcurrencyLimitLayer::new(API_MAX_CONCURRENT_REQUESTS));

    Router::new()
        // Health (public, no rate limit)
        .route("/health", get(health::health))
        // API v1 routes (rate limited)
        .nest("/v1", api_routes)
        // Webhooks (no rate limit - delivery volume is controlled by the provider)
        .route("/webhooks/billing", post(webhooks::billing_webhook))
        // Global middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
