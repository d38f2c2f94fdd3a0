//! Persistent store gateway
//!
//! The flush task writes through [`ClickStore::upsert_batch`] and the stats
//! path reads through [`ClickStore::select_range`]. Upserts must be additive:
//! writing a count for an existing (banner, minute) adds to what is stored.

use crate::error::{AppError, Result};
use crate::models::{coalesce_rows, BucketKey, ClickRow, MinuteCount};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Durable storage for minute buckets.
#[async_trait]
pub trait ClickStore: Send + Sync {
    /// Add every row's count to the stored count for its key.
    ///
    /// All-or-nothing: on error nothing from the batch is visible.
    async fn upsert_batch(&self, rows: &[ClickRow]) -> Result<()>;

    /// Stored counts for one banner with minute in `[from, to)`.
    async fn select_range(
        &self,
        banner_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<MinuteCount>>;

    /// Check the store is reachable.
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// In-process store with the same additive semantics as the database.
///
/// Used when `STORAGE_BACKEND=memory` and by tests, which can make it fail
/// on demand to exercise the requeue path.
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<BTreeMap<BucketKey, u64>>,
    failing: AtomicBool,
    upsert_calls: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following call fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of upsert attempts, successful or not.
    pub fn upsert_calls(&self) -> u64 {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    /// Stored count for one bucket, 0 if absent.
    pub fn stored(&self, banner_id: i64, minute: DateTime<Utc>) -> u64 {
        self.rows
            .lock()
            .get(&BucketKey::new(banner_id, minute))
            .copied()
            .unwrap_or(0)
    }

    fn check_available(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::DatabaseError("memory store unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ClickStore for MemoryStore {
    async fn upsert_batch(&self, rows: &[ClickRow]) -> Result<()> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available()?;

        let mut stored = self.rows.lock();
        for row in coalesce_rows(rows) {
            *stored.entry(row.key()).or_insert(0) += row.count;
        }
        Ok(())
    }

    async fn select_range(
        &self,
        banner_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<MinuteCount>> {
        self.check_available()?;
        if from >= to {
            return Ok(Vec::new());
        }

        let lower = BucketKey { banner_id, minute: from };
        let upper = BucketKey { banner_id, minute: to };
        let stored = self.rows.lock();
        let out = stored
            .range(lower..upper)
            .map(|(key, count)| MinuteCount {
                minute: key.minute,
                count: i64::try_from(*count).unwrap_or(i64::MAX),
            })
            .collect();
        Ok(out)
    }

    async fn ping(&self) -> Result<()> {
        self.check_available()
    }
}
