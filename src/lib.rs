pub mod clock;
pub mod config;
pub mod error;
pub mod handlers;
pub mod key;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod rate_limit;
pub mod state;
pub mod sweeper;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};

use crate::handlers::{bucket_handler, check_handler, health_handler, metrics_handler};
use crate::state::AppState;

// Build the application router. `/health` and `/metrics` are never gated.
pub fn build_router(state: Arc<AppState>) -> Router {
    let admission = Router::new()
        .route("/api/admission/check", post(check_handler))
        .route("/api/admission/buckets/{key}", get(bucket_handler))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::enforce_admission,
        ));

    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .merge(admission)
        .with_state(state)
}
