pub mod cache;
pub mod client_ip;
pub mod config;
pub mod error;
pub mod handlers;
pub mod load_balancer;
pub mod logging;
pub mod lookup;
pub mod metrics;
pub mod models;
pub mod parser;
pub mod provider;
pub mod rate_limit;
pub mod state;

use axum::Router;
use axum::routing::{any, get};
use std::sync::Arc;

use crate::handlers::{health_handler, lookup_handler, metrics_handler};
use crate::state::AppState;

// Lookups answer on "/" and on every path not claimed by another route
pub fn app_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/", any(lookup_handler))
        .fallback(lookup_handler)
        .with_state(state)
}
