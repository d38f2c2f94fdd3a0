//! Prometheus metrics endpoint

use axum::{extract::State, response::IntoResponse};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::state::AppState;

/// Application metrics for Prometheus
#[derive(Default)]
pub struct Metrics {
    /// Total clicks accepted
    clicks_total: AtomicU64,
    /// Total stats requests served
    stats_requests_total: AtomicU64,
    /// Batches written to storage
    flush_batches_total: AtomicU64,
    /// Bucket rows written to storage
    flushed_rows_total: AtomicU64,
    /// Failed flush attempts
    flush_failures_total: AtomicU64,
    /// Bucket rows put back into the aggregator after a failed flush
    requeued_rows_total: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_clicks(&self) {
        self.clicks_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_stats_requests(&self) {
        self.stats_requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_flush(&self, rows: u64) {
        self.flush_batches_total.fetch_add(1, Ordering::Relaxed);
        self.flushed_rows_total.fetch_add(rows, Ordering::Relaxed);
    }

    pub fn record_requeue(&self, rows: u64) {
        self.flush_failures_total.fetch_add(1, Ordering::Relaxed);
        self.requeued_rows_total.fetch_add(rows, Ordering::Relaxed);
    }

    pub fn get_metrics(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            clicks_total: self.clicks_total.load(Ordering::Relaxed),
            stats_requests_total: self.stats_requests_total.load(Ordering::Relaxed),
            flush_batches_total: self.flush_batches_total.load(Ordering::Relaxed),
            flushed_rows_total: self.flushed_rows_total.load(Ordering::Relaxed),
            flush_failures_total: self.flush_failures_total.load(Ordering::Relaxed),
            requeued_rows_total: self.requeued_rows_total.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub clicks_total: u64,
    pub stats_requests_total: u64,
    pub flush_batches_total: u64,
    pub flushed_rows_total: u64,
    pub flush_failures_total: u64,
    pub requeued_rows_total: u64,
}

/// GET /metrics
///
/// Returns Prometheus-format metrics
pub async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.metrics.get_metrics();
    let pending = state.service.aggregator().pending_buckets();

    let output = format!(
        r#"# HELP banner_counter_clicks_total Total number of clicks accepted
# TYPE banner_counter_clicks_total counter
banner_counter_clicks_total {}

# HELP banner_counter_stats_requests_total Total number of stats requests served
# TYPE banner_counter_stats_requests_total counter
banner_counter_stats_requests_total {}

# HELP banner_counter_flush_batches_total Total number of batches written to storage
# TYPE banner_counter_flush_batches_total counter
banner_counter_flush_batches_total {}

# HELP banner_counter_flushed_rows_total Total number of bucket rows written to storage
# TYPE banner_counter_flushed_rows_total counter
banner_counter_flushed_rows_total {}

# HELP banner_counter_flush_failures_total Total number of failed flush attempts
# TYPE banner_counter_flush_failures_total counter
banner_counter_flush_failures_total {}

# HELP banner_counter_requeued_rows_total Total number of bucket rows requeued after a failed flush
# TYPE banner_counter_requeued_rows_total counter
banner_counter_requeued_rows_total {}

# HELP banner_counter_pending_buckets Current number of buckets waiting to be flushed
# TYPE banner_counter_pending_buckets gauge
banner_counter_pending_buckets {}

# HELP banner_counter_info Build information
# TYPE banner_counter_info gauge
banner_counter_info{{version="{}"}} 1
"#,
        snapshot.clicks_total,
        snapshot.stats_requests_total,
        snapshot.flush_batches_total,
        snapshot.flushed_rows_total,
        snapshot.flush_failures_total,
        snapshot.requeued_rows_total,
        pending,
        env!("CARGO_PKG_VERSION"),
    );

    (
        [(axum::http::header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        output,
    )
}
