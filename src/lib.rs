//! Fixed-window rate limiter for the dealership app's sign-in, sign-up and
//! password-reset flows.
//!
//! `POST /api/rate-limit` with `{ "action": ..., "identifier": ... }` answers
//! 200 `{ limited: false, remainingAttempts }` or 429 `{ limited: true,
//! retryAfterMs }`. Counters live in a [`store::RecordStore`], either in
//! process or in the hosted database behind its REST interface.

pub mod config;
pub mod error;
pub mod handlers;
pub mod limiter;
pub mod metrics;
pub mod models;
pub mod pruner;
pub mod rate_limit;
pub mod state;
pub mod store;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::handlers::{check_handler, health_handler, metrics_handler};
use crate::state::AppState;

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api/rate-limit", post(check_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
