//! HTTP routes

pub mod counter;
pub mod health;
pub mod metrics;
pub mod stats;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::error::{AppError, Result};
use crate::state::AppState;

/// Build the application router
pub fn router(state: AppState) -> Router {
    Router::new()
        // Health and metrics (Kubernetes probes + Prometheus)
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/metrics", get(metrics::prometheus_metrics))
        // Clicks and stats
        .route("/counter/:banner_id", get(counter::count_click))
        .route("/stats/:banner_id", post(stats::get_stats))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Parse a banner id path segment; only positive integers are accepted.
pub(crate) fn parse_banner_id(raw: &str) -> Result<i64> {
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(AppError::InvalidRequest("bad banner id".into())),
    }
}
