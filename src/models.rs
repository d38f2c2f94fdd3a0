//! Core domain models for the banner counter

use chrono::{DateTime, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Truncate a timestamp to the start of its UTC minute.
pub fn truncate_to_minute(at: DateTime<Utc>) -> DateTime<Utc> {
    at - Duration::seconds(i64::from(at.second()))
        - Duration::nanoseconds(i64::from(at.nanosecond()))
}

/// Identity of one counting bucket: a banner within one UTC minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BucketKey {
    pub banner_id: i64,
    /// Always minute-aligned
    pub minute: DateTime<Utc>,
}

impl BucketKey {
    /// Build a key for `at`, truncating it to the minute.
    pub fn new(banner_id: i64, at: DateTime<Utc>) -> Self {
        Self {
            banner_id,
            minute: truncate_to_minute(at),
        }
    }
}

/// A bucket row as handed to (and stored by) the persistent store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClickRow {
    pub banner_id: i64,
    pub minute: DateTime<Utc>,
    pub count: u64,
}

impl ClickRow {
    pub fn key(&self) -> BucketKey {
        BucketKey::new(self.banner_id, self.minute)
    }
}

/// Sum rows sharing a bucket key so each key appears once.
pub fn coalesce_rows(rows: &[ClickRow]) -> Vec<ClickRow> {
    let mut merged: HashMap<BucketKey, u64> = HashMap::with_capacity(rows.len());
    for row in rows {
        *merged.entry(row.key()).or_default() += row.count;
    }

    let mut out: Vec<ClickRow> = merged
        .into_iter()
        .map(|(key, count)| ClickRow {
            banner_id: key.banner_id,
            minute: key.minute,
            count,
        })
        .collect();
    // Stable order keeps lock acquisition order deterministic in the database
    out.sort_by_key(|row| (row.banner_id, row.minute));
    out
}

/// Persisted count for one minute of a banner
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinuteCount {
    pub minute: DateTime<Utc>,
    pub count: i64,
}

/// A single point of the stats response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatPoint {
    /// Start of the minute
    pub ts: DateTime<Utc>,
    /// Click count, always positive
    pub v: i64,
}

/// Request payload for the stats endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct StatsRequest {
    /// Inclusive start (RFC 3339)
    pub from: DateTime<Utc>,
    /// Exclusive end (RFC 3339)
    pub to: DateTime<Utc>,
}

/// Response payload for the stats endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsResponse {
    pub stats: Vec<StatPoint>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_truncate_to_minute() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 59).unwrap()
            + Duration::milliseconds(999);
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 0).unwrap();
        assert_eq!(truncate_to_minute(at), expected);
        assert_eq!(truncate_to_minute(expected), expected);
    }

    #[test]
    fn test_bucket_key_truncates() {
        let a = BucketKey::new(7, Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 1).unwrap());
        let b = BucketKey::new(7, Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 42).unwrap());
        let c = BucketKey::new(8, Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 42).unwrap());
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_coalesce_rows_sums_duplicates() {
        let minute = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let rows = vec![
            ClickRow { banner_id: 1, minute, count: 2 },
            ClickRow { banner_id: 2, minute, count: 1 },
            ClickRow { banner_id: 1, minute, count: 3 },
        ];

        let merged = coalesce_rows(&rows);
        assert_eq!(
            merged,
            vec![
                ClickRow { banner_id: 1, minute, count: 5 },
                ClickRow { banner_id: 2, minute, count: 1 },
            ]
        );
    }

    #[test]
    fn test_stats_request_parses_rfc3339() {
        let req: StatsRequest = serde_json::from_str(
            r#"{"from":"2024-05-01T10:00:00Z","to":"2024-05-01T13:00:00+03:00"}"#,
        )
        .unwrap();
        assert_eq!(req.from, Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap());
        assert_eq!(req.to, req.from);
    }
}
