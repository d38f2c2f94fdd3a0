//! In-memory click aggregation buffer
//!
//! Clicks are counted per (banner, minute) bucket without touching storage.
//! The flush task periodically swaps the whole map out and persists it.

use crate::models::{truncate_to_minute, BucketKey, ClickRow};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;

const INITIAL_CAPACITY: usize = 1024;

/// Write-back buffer of pending click counts.
///
/// A single mutex guards the whole map. Every operation holds it for its
/// full duration and none of them perform I/O, so the critical sections stay
/// short and an increment can never be lost across a snapshot.
pub struct Aggregator {
    pending: Mutex<HashMap<BucketKey, u64>>,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl Aggregator {
    /// Create an empty aggregator.
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::with_capacity(INITIAL_CAPACITY)),
        }
    }

    /// Count one click for `banner_id` in the minute containing `at`.
    pub fn increment(&self, banner_id: i64, at: DateTime<Utc>) {
        let key = BucketKey::new(banner_id, at);
        *self.pending.lock().entry(key).or_insert(0) += 1;
    }

    /// Take everything pending and leave an empty map behind.
    ///
    /// Returns an empty vector when nothing is pending.
    pub fn snapshot_and_clear(&self) -> Vec<ClickRow> {
        let snapshot = {
            let mut pending = self.pending.lock();
            let capacity = pending.len().max(INITIAL_CAPACITY);
            std::mem::replace(&mut *pending, HashMap::with_capacity(capacity))
        };

        snapshot
            .into_iter()
            .map(|(key, count)| ClickRow {
                banner_id: key.banner_id,
                minute: key.minute,
                count,
            })
            .collect()
    }

    /// Merge a batch that failed to persist back into the pending map.
    ///
    /// Counts are added to whatever accumulated since the snapshot was taken.
    pub fn requeue(&self, rows: &[ClickRow]) {
        if rows.is_empty() {
            return;
        }

        let mut pending = self.pending.lock();
        for row in rows {
            *pending.entry(row.key()).or_insert(0) += row.count;
        }
    }

    /// Pending counts for one banner with minute in `[from, to)`.
    ///
    /// Both bounds are truncated to the minute first.
    pub fn range_query(
        &self,
        banner_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> HashMap<DateTime<Utc>, u64> {
        let from = truncate_to_minute(from);
        let to = truncate_to_minute(to);

        let pending = self.pending.lock();
        let mut out = HashMap::new();
        for (key, count) in pending.iter() {
            if key.banner_id == banner_id && key.minute >= from && key.minute < to {
                *out.entry(key.minute).or_insert(0) += *count;
            }
        }
        out
    }

    /// Number of buckets waiting to be flushed.
    #[inline]
    pub fn pending_buckets(&self) -> usize {
        self.pending.lock().len()
    }

    /// Check if nothing is waiting to be flushed.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}
