//! Latest-snapshot and deviation queries

use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use coinstats_core::{AssetId, QueryError, QueryResult, Sample};
use coinstats_store::TimeSeriesStore;

use crate::stats::{population_std_dev, round_dp};

/// Fewest samples a deviation is defined for
pub const MIN_DEVIATION_SAMPLES: usize = 2;

pub const DEFAULT_DEVIATION_WINDOW: usize = 100;

const DEVIATION_DECIMALS: u32 = 2;

/// Latest observation for one asset
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub price: f64,
    #[serde(rename = "marketCap")]
    pub market_cap: f64,
    #[serde(rename = "24hChange")]
    pub change_24h: f64,
}

impl From<&Sample> for Snapshot {
    fn from(sample: &Sample) -> Self {
        Self {
            price: sample.price_usd,
            market_cap: sample.market_cap_usd,
            change_24h: sample.change_24h,
        }
    }
}

/// Population standard deviation of price, rounded to 2 decimal places
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Deviation {
    pub deviation: f64,
}

/// Read side over the sample store
#[derive(Clone)]
pub struct QueryService {
    store: Arc<dyn TimeSeriesStore>,
    window: usize,
}

impl QueryService {
    pub fn new(store: Arc<dyn TimeSeriesStore>) -> Self {
        Self {
            store,
            window: DEFAULT_DEVIATION_WINDOW,
        }
    }

    pub fn with_window(mut self, window: usize) -> Self {
        self.window = window;
        self
    }

    pub fn store(&self) -> &Arc<dyn TimeSeriesStore> {
        &self.store
    }

    /// Latest price, market cap and 24h change for `coin`
    pub async fn latest_snapshot(&self, coin: Option<&str>) -> QueryResult<Snapshot> {
        let asset = parse_coin(coin)?;

        let sample = self
            .store
            .latest(&asset)
            .await?
            .ok_or(QueryError::NotFound(asset))?;

        Ok(Snapshot::from(&sample))
    }

    /// Deviation over the configured trailing window
    pub async fn deviation(&self, coin: Option<&str>) -> QueryResult<Deviation> {
        self.deviation_with_window(coin, self.window).await
    }

    /// Deviation over the `window` most recent samples.
    ///
    /// The window counts samples, not time: with a shorter history every
    /// available sample is used.
    pub async fn deviation_with_window(
        &self,
        coin: Option<&str>,
        window: usize,
    ) -> QueryResult<Deviation> {
        let asset = parse_coin(coin)?;

        let samples = self.store.recent(&asset, window).await?;
        let prices: Vec<f64> = samples.iter().map(|s| s.price_usd).collect();

        let sd = population_std_dev(&prices).ok_or(QueryError::InsufficientData {
            asset: asset.clone(),
            available: prices.len(),
            required: MIN_DEVIATION_SAMPLES,
        })?;

        debug!("Deviation for {} over {} samples: {}", asset, prices.len(), sd);

        Ok(Deviation {
            deviation: round_dp(sd, DEVIATION_DECIMALS),
        })
    }
}

fn parse_coin(coin: Option<&str>) -> QueryResult<AssetId> {
    coin.and_then(AssetId::parse)
        .ok_or(QueryError::MissingParameter("coin"))
}
