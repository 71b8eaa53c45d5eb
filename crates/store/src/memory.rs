//! In-memory time-series store
//!
//! A single `RwLock` guards every series so a cycle's batch lands under one
//! write-lock acquisition and readers never see part of it.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use coinstats_core::{AssetId, Sample, StoreResult};

use crate::{StoreStats, TimeSeriesStore};

/// Per-asset sample history held in process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Samples per asset, ascending by capture time
    series: RwLock<HashMap<AssetId, Vec<Sample>>>,

    /// Batches applied so far
    batch_count: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one batch under a single write lock
    pub fn insert_batch(&self, samples: &[Sample]) {
        if samples.is_empty() {
            return;
        }

        let mut series = self.series.write();
        for sample in samples {
            let history = series.entry(sample.asset.clone()).or_default();
            let idx = history.partition_point(|s| s.captured_at < sample.captured_at);

            match history.get_mut(idx) {
                Some(existing) if existing.captured_at == sample.captured_at => {
                    *existing = sample.clone();
                }
                _ => history.insert(idx, sample.clone()),
            }
        }

        self.batch_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_latest(&self, asset: &AssetId) -> Option<Sample> {
        self.series
            .read()
            .get(asset)
            .and_then(|history| history.last().cloned())
    }

    pub fn get_recent(&self, asset: &AssetId, limit: usize) -> Vec<Sample> {
        self.series
            .read()
            .get(asset)
            .map(|history| history.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default()
    }

    pub fn batch_count(&self) -> u64 {
        self.batch_count.load(Ordering::Relaxed)
    }

    pub fn snapshot_stats(&self) -> StoreStats {
        let series = self.series.read();
        StoreStats {
            asset_count: series.len(),
            sample_count: series.values().map(Vec::len).sum(),
        }
    }
}

#[async_trait]
impl TimeSeriesStore for MemoryStore {
    async fn upsert_latest(&self, samples: &[Sample]) -> StoreResult<()> {
        self.insert_batch(samples);
        Ok(())
    }

    async fn latest(&self, asset: &AssetId) -> StoreResult<Option<Sample>> {
        Ok(self.get_latest(asset))
    }

    async fn recent(&self, asset: &AssetId, limit: usize) -> StoreResult<Vec<Sample>> {
        Ok(self.get_recent(asset, limit))
    }

    async fn stats(&self) -> StoreResult<StoreStats> {
        Ok(self.snapshot_stats())
    }
}
