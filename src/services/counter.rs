//! Click counting and the stats read path

use crate::aggregator::Aggregator;
use crate::error::Result;
use crate::models::{truncate_to_minute, MinuteCount, StatPoint};
use crate::store::ClickStore;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

/// Entry point used by the HTTP layer.
///
/// Writes go to the aggregator only. Reads combine what the store already
/// has with what is still pending in memory.
#[derive(Clone)]
pub struct CounterService {
    aggregator: Arc<Aggregator>,
    store: Arc<dyn ClickStore>,
}

impl CounterService {
    pub fn new(aggregator: Arc<Aggregator>, store: Arc<dyn ClickStore>) -> Self {
        Self { aggregator, store }
    }

    pub fn aggregator(&self) -> &Arc<Aggregator> {
        &self.aggregator
    }

    pub fn store(&self) -> &Arc<dyn ClickStore> {
        &self.store
    }

    /// Record a click at the current wall-clock time.
    pub fn inc_click(&self, banner_id: i64) {
        self.inc_click_at(banner_id, Utc::now());
    }

    pub fn inc_click_at(&self, banner_id: i64, at: DateTime<Utc>) {
        self.aggregator.increment(banner_id, at);
    }

    /// Per-minute click counts for `banner_id` in `[from, to)`.
    ///
    /// A minute may be fully persisted, fully pending or split between both;
    /// the two sources are summed. The aggregator lock is only taken after
    /// the store read has finished.
    pub async fn get_stats(
        &self,
        banner_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<StatPoint>> {
        let from = truncate_to_minute(from);
        let to = truncate_to_minute(to);

        let persisted = self.store.select_range(banner_id, from, to).await?;
        let pending = self.aggregator.range_query(banner_id, from, to);

        debug!(
            banner_id = banner_id,
            persisted = persisted.len(),
            pending = pending.len(),
            "Merging stats"
        );

        Ok(merge_points(&persisted, &pending))
    }
}

/// Sum persisted and pending counts per minute.
///
/// Output is ascending by minute and holds only strictly positive totals.
pub fn merge_points(
    persisted: &[MinuteCount],
    pending: &HashMap<DateTime<Utc>, u64>,
) -> Vec<StatPoint> {
    let mut totals: BTreeMap<DateTime<Utc>, i64> = BTreeMap::new();

    for row in persisted {
        let total = totals.entry(row.minute).or_insert(0);
        *total = total.saturating_add(row.count);
    }
    for (minute, count) in pending {
        let total = totals.entry(*minute).or_insert(0);
        *total = total.saturating_add(i64::try_from(*count).unwrap_or(i64::MAX));
    }

    totals
        .into_iter()
        .filter(|(_, v)| *v > 0)
        .map(|(ts, v)| StatPoint { ts, v })
        .collect()
}
