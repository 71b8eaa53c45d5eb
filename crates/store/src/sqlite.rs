//! SQLite-backed time-series store
//!
//! One `samples` table keyed by (asset, captured_at). Every cycle's batch is
//! written inside one transaction; all SQLite work runs on the blocking pool.

use async_trait::async_trait;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use coinstats_core::{from_millis, AssetId, Sample, StoreError, StoreResult};

use crate::{StoreStats, TimeSeriesStore};

pub type DbPool = Pool<SqliteConnectionManager>;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS samples (
        asset          TEXT    NOT NULL,
        price_usd      REAL    NOT NULL,
        market_cap_usd REAL    NOT NULL,
        change_24h     REAL    NOT NULL,
        captured_at    INTEGER NOT NULL,
        PRIMARY KEY (asset, captured_at)
    );
    CREATE INDEX IF NOT EXISTS idx_samples_asset_time
        ON samples (asset, captured_at DESC);
";

const UPSERT_SQL: &str = "
    INSERT INTO samples (asset, price_usd, market_cap_usd, change_24h, captured_at)
    VALUES (?1, ?2, ?3, ?4, ?5)
    ON CONFLICT (asset, captured_at) DO UPDATE SET
        price_usd      = excluded.price_usd,
        market_cap_usd = excluded.market_cap_usd,
        change_24h     = excluded.change_24h
";

const RECENT_SQL: &str = "
    SELECT asset, price_usd, market_cap_usd, change_24h, captured_at
    FROM samples
    WHERE asset = ?1
    ORDER BY captured_at DESC
    LIMIT ?2
";

/// Persistent store over a pooled SQLite database
#[derive(Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    /// Open (creating if needed) the database file and apply the schema
    pub fn open(path: &Path, max_size: u32) -> StoreResult<Self> {
        let manager = SqliteConnectionManager::file(path)
            .with_init(|conn| conn.busy_timeout(Duration::from_secs(5)));
        let pool = Pool::builder()
            .max_size(max_size)
            .build(manager)
            .map_err(unavailable)?;

        let store = Self { pool };
        store.migrate()?;
        info!("Opened SQLite sample store at {}", path.display());
        Ok(store)
    }

    /// Private in-memory database. Pinned to one connection, since every
    /// SQLite `:memory:` connection is its own database.
    pub fn open_in_memory() -> StoreResult<Self> {
        let pool = Pool::builder()
            .max_size(1)
            .build(SqliteConnectionManager::memory())
            .map_err(unavailable)?;

        let store = Self { pool };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> StoreResult<()> {
        let conn = self.pool.get().map_err(unavailable)?;
        conn.execute_batch(SCHEMA).map_err(unavailable)?;
        Ok(())
    }

    async fn with_conn<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(unavailable)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("blocking task failed: {e}")))?
    }
}

fn unavailable(e: impl std::fmt::Display) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

fn write_failed(e: impl std::fmt::Display) -> StoreError {
    StoreError::WriteFailed(e.to_string())
}

fn row_to_sample(row: &Row<'_>) -> rusqlite::Result<Sample> {
    let asset: String = row.get(0)?;
    Ok(Sample {
        asset: AssetId::new(&asset),
        price_usd: row.get(1)?,
        market_cap_usd: row.get(2)?,
        change_24h: row.get(3)?,
        captured_at: from_millis(row.get(4)?),
    })
}

fn query_recent(conn: &Connection, asset: &AssetId, limit: usize) -> StoreResult<Vec<Sample>> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let mut stmt = conn.prepare_cached(RECENT_SQL).map_err(unavailable)?;
    let rows = stmt
        .query_map(params![asset.as_str(), limit], row_to_sample)
        .map_err(unavailable)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(unavailable)?;
    Ok(rows)
}

#[async_trait]
impl TimeSeriesStore for SqliteStore {
    async fn upsert_latest(&self, samples: &[Sample]) -> StoreResult<()> {
        if samples.is_empty() {
            return Ok(());
        }

        let batch = samples.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.transaction().map_err(write_failed)?;
            {
                let mut stmt = tx.prepare_cached(UPSERT_SQL).map_err(write_failed)?;
                for s in &batch {
                    stmt.execute(params![
                        s.asset.as_str(),
                        s.price_usd,
                        s.market_cap_usd,
                        s.change_24h,
                        s.captured_at_ms(),
                    ])
                    .map_err(write_failed)?;
                }
            }
            tx.commit().map_err(write_failed)?;
            debug!("Committed batch of {} samples", batch.len());
            Ok(())
        })
        .await
    }

    async fn latest(&self, asset: &AssetId) -> StoreResult<Option<Sample>> {
        let asset = asset.clone();
        self.with_conn(move |conn| Ok(query_recent(conn, &asset, 1)?.into_iter().next()))
            .await
    }

    async fn recent(&self, asset: &AssetId, limit: usize) -> StoreResult<Vec<Sample>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let asset = asset.clone();
        self.with_conn(move |conn| query_recent(conn, &asset, limit)).await
    }

    async fn stats(&self) -> StoreResult<StoreStats> {
        self.with_conn(|conn| {
            let (assets, samples): (i64, i64) = conn
                .query_row(
                    "SELECT COUNT(DISTINCT asset), COUNT(*) FROM samples",
                    [],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .map_err(unavailable)?;
            Ok(StoreStats {
                asset_count: assets as usize,
                sample_count: samples as usize,
            })
        })
        .await
    }
}
