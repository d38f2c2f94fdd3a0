//! Application state shared across handlers

use crate::aggregator::Aggregator;
use crate::routes::metrics::Metrics;
use crate::services::counter::CounterService;
use crate::store::ClickStore;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Click counting and stats merge
    pub service: CounterService,
    /// Application metrics for Prometheus
    pub metrics: Arc<Metrics>,
}

impl AppState {
    /// Create new application state
    ///
    /// # Arguments
    /// * `aggregator` - The single in-memory click buffer, also handed to the flush task
    /// * `store` - Persistent store gateway
    /// * `metrics` - Counters shared with the flush task
    pub fn new(aggregator: Arc<Aggregator>, store: Arc<dyn ClickStore>, metrics: Arc<Metrics>) -> Self {
        Self {
            service: CounterService::new(aggregator, store),
            metrics,
        }
    }
}
