//! Database access layer with SQLx and PostgreSQL

use crate::error::{AppError, Result};
use crate::models::{coalesce_rows, ClickRow, MinuteCount};
use crate::store::ClickStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder};
use std::time::Duration;
use tracing::{debug, info};

/// PostgreSQL caps bind parameters at 65535 per statement; each row binds 3.
const MAX_ROWS_PER_STATEMENT: usize = 10_000;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS banner_clicks (
    banner_id BIGINT      NOT NULL,
    ts_minute TIMESTAMPTZ NOT NULL,
    count     BIGINT      NOT NULL,
    PRIMARY KEY (banner_id, ts_minute)
)
"#;

/// Database connection pool and operations
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool
    pub async fn new(connection_string: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(1)
            .acquire_timeout(Duration::from_secs(5))
            .idle_timeout(Duration::from_secs(600))
            .connect(connection_string)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to connect: {}", e)))?;

        info!("Database connection pool established");
        Ok(Self { pool })
    }

    /// Create the clicks table if it does not exist yet
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(SCHEMA).execute(&self.pool).await?;
        info!("Database schema is up to date");
        Ok(())
    }
}

#[async_trait]
impl ClickStore for Database {
    async fn upsert_batch(&self, rows: &[ClickRow]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }

        // ON CONFLICT cannot touch the same row twice in one statement
        let rows = coalesce_rows(rows)
            .into_iter()
            .map(|row| -> Result<(i64, DateTime<Utc>, i64)> {
                let count = i64::try_from(row.count).map_err(|_| {
                    AppError::InternalError(format!("count overflow for banner {}", row.banner_id))
                })?;
                Ok((row.banner_id, row.minute, count))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut tx = self.pool.begin().await?;
        for chunk in rows.chunks(MAX_ROWS_PER_STATEMENT) {
            let mut query: QueryBuilder<Postgres> =
                QueryBuilder::new("INSERT INTO banner_clicks (banner_id, ts_minute, count) ");
            query.push_values(chunk, |mut b, (banner_id, minute, count)| {
                b.push_bind(*banner_id).push_bind(*minute).push_bind(*count);
            });
            query.push(
                " ON CONFLICT (banner_id, ts_minute) DO UPDATE \
                 SET count = banner_clicks.count + EXCLUDED.count",
            );
            query.build().execute(&mut *tx).await?;
        }
        tx.commit().await?;

        debug!(rows = rows.len(), "Upserted click buckets");
        Ok(())
    }

    async fn select_range(
        &self,
        banner_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<MinuteCount>> {
        let rows: Vec<(DateTime<Utc>, i64)> = sqlx::query_as(
            r#"
            SELECT ts_minute, count
            FROM banner_clicks
            WHERE banner_id = $1
              AND ts_minute >= $2
              AND ts_minute <  $3
            ORDER BY ts_minute ASC
            "#,
        )
        .bind(banner_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(minute, count)| MinuteCount { minute, count })
            .collect())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
