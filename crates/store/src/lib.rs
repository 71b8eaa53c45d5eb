//! Time-series sample storage
//!
//! Features:
//! - Atomic multi-asset batch writes (one batch per ingestion cycle)
//! - Idempotent upsert keyed on (asset, capture time)
//! - Latest and top-N-recent reads, newest first
//! - In-memory and SQLite backends behind one trait

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use serde::Serialize;

use coinstats_core::{AssetId, Sample, StoreResult};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Keyed, time-ordered collection of samples
#[async_trait]
pub trait TimeSeriesStore: Send + Sync {
    /// Record every sample of one cycle as a single atomic batch.
    ///
    /// A sample whose (asset, captured_at) already exists replaces that
    /// record; anything else is appended. On error nothing is applied.
    async fn upsert_latest(&self, samples: &[Sample]) -> StoreResult<()>;

    /// Most recently captured sample, `None` if the asset was never seen
    async fn latest(&self, asset: &AssetId) -> StoreResult<Option<Sample>>;

    /// Up to `limit` most recent samples, newest first
    async fn recent(&self, asset: &AssetId, limit: usize) -> StoreResult<Vec<Sample>>;

    async fn stats(&self) -> StoreResult<StoreStats>;
}

/// Statistics about stored history
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub asset_count: usize,
    pub sample_count: usize,
}
