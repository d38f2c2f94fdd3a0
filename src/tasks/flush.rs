//! Flush task - moves pending click buckets from the aggregator to storage

use crate::aggregator::Aggregator;
use crate::routes::metrics::Metrics;
use crate::shutdown::Shutdown;
use crate::store::ClickStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Result of a single flush attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing was pending
    Idle,
    /// Batch of this many rows was persisted
    Flushed(usize),
    /// Store failed; this many rows went back into the aggregator
    Requeued(usize),
}

/// Snapshot the aggregator and write the batch to the store.
///
/// On any store error the whole batch is requeued and retried on the next
/// call together with whatever accumulated meanwhile.
pub async fn flush_once(
    aggregator: &Aggregator,
    store: &dyn ClickStore,
    metrics: &Metrics,
) -> FlushOutcome {
    let batch = aggregator.snapshot_and_clear();
    if batch.is_empty() {
        return FlushOutcome::Idle;
    }

    let batch_size = batch.len();
    debug!(batch_size = batch_size, "Flushing click batch to storage");

    match store.upsert_batch(&batch).await {
        Ok(()) => {
            metrics.record_flush(batch_size as u64);
            debug!(rows = batch_size, "Click batch persisted");
            FlushOutcome::Flushed(batch_size)
        }
        Err(e) => {
            error!(error = %e, batch_size = batch_size, "Flush failed, requeueing batch");
            aggregator.requeue(&batch);
            metrics.record_requeue(batch_size as u64);
            FlushOutcome::Requeued(batch_size)
        }
    }
}

/// Background task that periodically flushes the aggregator.
///
/// When the shutdown latch trips it performs one last flush and returns.
/// If that final attempt fails the batch is requeued into an aggregator that
/// is about to be dropped, so those clicks are lost.
pub async fn flush_task(
    aggregator: Arc<Aggregator>,
    store: Arc<dyn ClickStore>,
    metrics: Arc<Metrics>,
    period: Duration,
    shutdown: Shutdown,
) {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(interval_ms = period.as_millis() as u64, "Flush task started");

    loop {
        tokio::select! {
            biased;
            _ = shutdown.wait() => {
                match flush_once(&aggregator, store.as_ref(), &metrics).await {
                    FlushOutcome::Requeued(rows) => {
                        warn!(rows = rows, "Final flush failed, pending clicks are lost");
                    }
                    outcome => info!(?outcome, "Final flush complete"),
                }
                return;
            }
            _ = interval.tick() => {
                flush_once(&aggregator, store.as_ref(), &metrics).await;
            }
        }
    }
}
