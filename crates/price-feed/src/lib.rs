//! Scheduled price ingestion
//!
//! Features:
//! - One batched provider request per cycle for every tracked asset
//! - All-or-nothing parsing: a cycle yields a full sample set or an error
//! - Fixed-interval scheduler with an immediate first run
//! - Non-overlapping cycles, cancellable on shutdown

pub mod feeds;
pub mod scheduler;

pub use feeds::{CoinGeckoFeed, FeedConfig, PriceSource};
pub use scheduler::{CycleOutcome, CyclePhase, IngestionScheduler, SchedulerConfig, SchedulerStats};
