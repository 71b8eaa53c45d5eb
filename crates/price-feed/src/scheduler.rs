//! Ingestion scheduler - drives fetch-then-write cycles

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use coinstats_core::{
    AssetId, FetchError, IngestionConfig, Sample, StoreError, TrackedAsset,
    MAX_INGESTION_INTERVAL_SECS,
};
use coinstats_store::TimeSeriesStore;

use crate::feeds::PriceSource;

/// Scheduler configuration
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub interval: Duration,
    pub run_on_start: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2 * 60 * 60),
            run_on_start: true,
        }
    }
}

impl From<&IngestionConfig> for SchedulerConfig {
    fn from(cfg: &IngestionConfig) -> Self {
        Self {
            interval: cfg.interval(),
            run_on_start: cfg.run_on_start,
        }
    }
}

/// Where the current cycle is. `Idle` between cycles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePhase {
    #[default]
    Idle,
    Fetching,
    Writing,
}

/// Result of one trigger
#[derive(Debug)]
pub enum CycleOutcome {
    Written {
        samples: usize,
        captured_at: DateTime<Utc>,
    },
    FetchFailed(FetchError),
    WriteFailed(StoreError),
    /// Another cycle was still in flight
    Skipped,
}

/// Scheduler statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerStats {
    pub phase: CyclePhase,
    pub cycles_written: u64,
    pub cycles_failed: u64,
    pub cycles_skipped: u64,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Resets the phase to `Idle` however the cycle ends, including when its
/// future is dropped on shutdown.
struct PhaseGuard<'a> {
    stats: &'a RwLock<SchedulerStats>,
}

impl<'a> PhaseGuard<'a> {
    fn enter(stats: &'a RwLock<SchedulerStats>) -> Self {
        stats.write().phase = CyclePhase::Fetching;
        Self { stats }
    }

    fn advance(&self, phase: CyclePhase) {
        self.stats.write().phase = phase;
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        self.stats.write().phase = CyclePhase::Idle;
    }
}

/// Periodic fetch-then-write driver
pub struct IngestionScheduler {
    config: SchedulerConfig,
    assets: Vec<TrackedAsset>,
    source: Arc<dyn PriceSource>,
    store: Arc<dyn TimeSeriesStore>,
    /// Held for the duration of a cycle
    cycle_guard: Mutex<()>,
    stats: RwLock<SchedulerStats>,
}

impl IngestionScheduler {
    pub fn new(
        config: SchedulerConfig,
        assets: Vec<TrackedAsset>,
        source: Arc<dyn PriceSource>,
        store: Arc<dyn TimeSeriesStore>,
    ) -> Self {
        Self {
            config,
            assets,
            source,
            store,
            cycle_guard: Mutex::new(()),
            stats: RwLock::new(SchedulerStats::default()),
        }
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats.read().clone()
    }

    /// Run until `shutdown` flips to true (or its sender goes away).
    ///
    /// First cycle fires immediately when `run_on_start` is set. Late ticks
    /// are skipped rather than bunched up.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let period = self.period();
        info!(
            "Starting ingestion scheduler: {} assets from {} every {:?}",
            self.assets.len(),
            self.source.name(),
            period
        );

        let now = Instant::now();
        let start = if self.config.run_on_start {
            now
        } else {
            now.checked_add(period).unwrap_or(now)
        };
        let mut ticker = tokio::time::interval_at(start, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    tokio::select! {
                        outcome = self.run_cycle() => {
                            debug!("Cycle finished: {:?}", outcome);
                        }
                        _ = shutdown_requested(&mut shutdown) => {
                            warn!("Shutdown during an in-flight cycle, abandoning it");
                            break;
                        }
                    }
                }
                _ = shutdown_requested(&mut shutdown) => {
                    info!("Ingestion scheduler shutdown requested");
                    break;
                }
            }
        }
    }

    /// Tick period, kept within what the timer can represent
    fn period(&self) -> Duration {
        let max = Duration::from_secs(MAX_INGESTION_INTERVAL_SECS);
        if self.config.interval > max {
            warn!(
                "Ingestion interval {:?} too long, clamping to {:?}",
                self.config.interval, max
            );
        }
        self.config.interval.clamp(Duration::from_millis(1), max)
    }

    /// Execute one fetch-then-write cycle, unless one is already running
    pub async fn run_cycle(&self) -> CycleOutcome {
        let Ok(_cycle) = self.cycle_guard.try_lock() else {
            warn!("Previous ingestion cycle still running, skipping this trigger");
            self.stats.write().cycles_skipped += 1;
            return CycleOutcome::Skipped;
        };

        let phase = PhaseGuard::enter(&self.stats);

        let batch = match self.source.fetch(&self.assets).await {
            Ok(samples) => match self.into_batch(samples) {
                Ok(batch) => batch,
                Err(e) => return self.fail_fetch(e),
            },
            Err(e) => return self.fail_fetch(e),
        };

        phase.advance(CyclePhase::Writing);

        match self.store.upsert_latest(&batch).await {
            Ok(()) => {
                let captured_at = batch
                    .first()
                    .map(|s| s.captured_at)
                    .unwrap_or_else(Utc::now);
                {
                    let mut stats = self.stats.write();
                    stats.cycles_written += 1;
                    stats.last_success = Some(captured_at);
                }
                info!(
                    "Crypto data updated: {} samples at {}",
                    batch.len(),
                    captured_at.to_rfc3339()
                );
                CycleOutcome::Written {
                    samples: batch.len(),
                    captured_at,
                }
            }
            Err(e) => {
                error!("Ingestion write failed, dropping cycle: {}", e);
                self.record_failure(&e);
                CycleOutcome::WriteFailed(e)
            }
        }
    }

    /// Order samples by the tracked table and check the cycle invariants:
    /// one sample per tracked asset, one shared capture time.
    fn into_batch(&self, mut samples: BTreeMap<AssetId, Sample>) -> Result<Vec<Sample>, FetchError> {
        let batch = self
            .assets
            .iter()
            .map(|asset| {
                samples
                    .remove(&asset.id)
                    .ok_or_else(|| FetchError::MissingAsset(asset.provider_key.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(first) = batch.first() {
            if batch.iter().any(|s| s.captured_at != first.captured_at) {
                return Err(FetchError::MalformedBody(
                    "samples in one cycle carry different capture times".to_string(),
                ));
            }
        }

        Ok(batch)
    }

    fn fail_fetch(&self, e: FetchError) -> CycleOutcome {
        error!("Error fetching crypto data, dropping cycle: {}", e);
        self.record_failure(&e);
        CycleOutcome::FetchFailed(e)
    }

    fn record_failure(&self, e: &dyn std::error::Error) {
        let mut stats = self.stats.write();
        stats.cycles_failed += 1;
        stats.last_error = Some(e.to_string());
    }
}

/// Resolves once shutdown is signalled or the sender is gone
async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}
