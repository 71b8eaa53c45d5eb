//! Price provider implementations

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tracing::debug;

use coinstats_core::{
    capture_now, AssetId, FetchError, FetchResult, ProviderConfig, Sample, TrackedAsset,
};

/// Feed configuration
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub base_url: String,
    pub request_timeout: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.coingecko.com/api/v3".to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl From<&ProviderConfig> for FeedConfig {
    fn from(cfg: &ProviderConfig) -> Self {
        Self {
            base_url: cfg.base_url.clone(),
            request_timeout: cfg.request_timeout(),
        }
    }
}

/// Source of one cycle's samples.
///
/// Implementations return either a sample for every requested asset, all
/// carrying the same capture time, or an error. Never a partial set.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch(&self, assets: &[TrackedAsset]) -> FetchResult<BTreeMap<AssetId, Sample>>;
    fn name(&self) -> &'static str;
}

/// CoinGecko `/simple/price` feed
pub struct CoinGeckoFeed {
    config: FeedConfig,
    client: Client,
}

impl CoinGeckoFeed {
    pub fn new(config: FeedConfig) -> FetchResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| FetchError::Request(e.to_string()))?;

        Ok(Self { config, client })
    }

    fn price_url(&self) -> String {
        format!("{}/simple/price", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl PriceSource for CoinGeckoFeed {
    async fn fetch(&self, assets: &[TrackedAsset]) -> FetchResult<BTreeMap<AssetId, Sample>> {
        if assets.is_empty() {
            return Ok(BTreeMap::new());
        }

        let ids = assets
            .iter()
            .map(|a| a.provider_key.as_str())
            .collect::<Vec<_>>()
            .join(",");

        debug!("Requesting {} for ids={}", self.price_url(), ids);

        let resp = self
            .client
            .get(self.price_url())
            .header(ACCEPT, "application/json")
            .query(&[
                ("ids", ids.as_str()),
                ("vs_currencies", "usd"),
                ("include_market_cap", "true"),
                ("include_24hr_change", "true"),
            ])
            .send()
            .await
            .map_err(|e| FetchError::Request(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| FetchError::Request(e.to_string()))?;

        // Accepted: one timestamp for the whole batch
        let captured_at = capture_now();
        parse_simple_price(&body, assets, captured_at)
    }

    fn name(&self) -> &'static str {
        "coingecko"
    }
}

/// One provider entry, e.g. `{"usd": 1.0, "usd_market_cap": 2.0, "usd_24h_change": -0.5}`
#[derive(Debug, Deserialize)]
struct ProviderQuote {
    usd: Option<f64>,
    usd_market_cap: Option<f64>,
    usd_24h_change: Option<f64>,
}

/// Parse a `/simple/price` body into one sample per tracked asset
pub fn parse_simple_price(
    body: &[u8],
    assets: &[TrackedAsset],
    captured_at: DateTime<Utc>,
) -> FetchResult<BTreeMap<AssetId, Sample>> {
    let quotes: HashMap<String, ProviderQuote> =
        serde_json::from_slice(body).map_err(|e| FetchError::MalformedBody(e.to_string()))?;

    let mut samples = BTreeMap::new();
    for asset in assets {
        let key = asset.provider_key.as_str();
        let quote = quotes
            .get(key)
            .ok_or_else(|| FetchError::MissingAsset(key.to_string()))?;

        let sample = Sample {
            asset: asset.id.clone(),
            price_usd: require(quote.usd, key, "usd", false)?,
            market_cap_usd: require(quote.usd_market_cap, key, "usd_market_cap", false)?,
            change_24h: require(quote.usd_24h_change, key, "usd_24h_change", true)?,
            captured_at,
        };
        samples.insert(asset.id.clone(), sample);
    }

    Ok(samples)
}

fn require(
    value: Option<f64>,
    provider_key: &str,
    field: &'static str,
    signed: bool,
) -> FetchResult<f64> {
    let value = value.ok_or_else(|| FetchError::MissingField {
        provider_key: provider_key.to_string(),
        field,
    })?;

    if !value.is_finite() || (!signed && value < 0.0) {
        return Err(FetchError::InvalidField {
            provider_key: provider_key.to_string(),
            field,
            value,
        });
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Query, State};
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;
    use coinstats_core::default_assets;
    use parking_lot::Mutex;
    use std::sync::Arc;

    const FULL_BODY: &str = r#"{
        "bitcoin": {"usd": 64000.5, "usd_market_cap": 1260000000000.0, "usd_24h_change": 1.25},
        "matic-network": {"usd": 0.71, "usd_market_cap": 6600000000.0, "usd_24h_change": -3.4},
        "ethereum": {"usd": 3100.0, "usd_market_cap": 372000000000.0, "usd_24h_change": 0.0}
    }"#;

    #[derive(Clone)]
    struct MockProvider {
        status: StatusCode,
        body: &'static str,
        seen: Arc<Mutex<Vec<HashMap<String, String>>>>,
    }

    async fn simple_price(
        State(mock): State<MockProvider>,
        Query(params): Query<HashMap<String, String>>,
    ) -> (StatusCode, &'static str) {
        mock.seen.lock().push(params);
        (mock.status, mock.body)
    }

    /// Serve canned responses on a local port; returns the base URL
    async fn spawn_provider(
        status: StatusCode,
        body: &'static str,
    ) -> (String, Arc<Mutex<Vec<HashMap<String, String>>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route("/simple/price", get(simple_price))
            .with_state(MockProvider {
                status,
                body,
                seen: Arc::clone(&seen),
            });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{addr}"), seen)
    }

    fn feed(base_url: String) -> CoinGeckoFeed {
        CoinGeckoFeed::new(FeedConfig {
            base_url,
            request_timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_batches_all_assets_in_one_request() {
        let (base, seen) = spawn_provider(StatusCode::OK, FULL_BODY).await;
        let assets = default_assets();

        let samples = feed(base).fetch(&assets).await.unwrap();

        let requests = seen.lock().clone();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0]["ids"], "bitcoin,matic-network,ethereum");
        assert_eq!(requests[0]["vs_currencies"], "usd");
        assert_eq!(requests[0]["include_market_cap"], "true");
        assert_eq!(requests[0]["include_24hr_change"], "true");

        assert_eq!(samples.len(), assets.len());
        let stamp = samples.values().next().unwrap().captured_at;
        assert!(samples.values().all(|s| s.captured_at == stamp));

        let matic = &samples[&AssetId::new("matic")];
        assert_eq!(matic.price_usd, 0.71);
        assert_eq!(matic.change_24h, -3.4);
    }

    #[tokio::test]
    async fn test_non_success_status() {
        let (base, _) = spawn_provider(StatusCode::TOO_MANY_REQUESTS, "{}").await;
        let err = feed(base).fetch(&default_assets()).await.unwrap_err();
        assert!(matches!(err, FetchError::Status(429)));
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let (base, _) = spawn_provider(StatusCode::OK, "<html>busy</html>").await;
        let err = feed(base).fetch(&default_assets()).await.unwrap_err();
        assert!(matches!(err, FetchError::MalformedBody(_)));
    }

    #[tokio::test]
    async fn test_unreachable_provider() {
        // Bind then drop to get a port nobody listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = feed(format!("http://{addr}"))
            .fetch(&default_assets())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Request(_)));
    }

    #[tokio::test]
    async fn test_no_assets_no_request() {
        let (base, seen) = spawn_provider(StatusCode::OK, FULL_BODY).await;
        let samples = feed(base).fetch(&[]).await.unwrap();
        assert!(samples.is_empty());
        assert!(seen.lock().is_empty());
    }

    #[test]
    fn test_missing_asset_fails_whole_batch() {
        let body = br#"{"bitcoin": {"usd": 1.0, "usd_market_cap": 2.0, "usd_24h_change": 0.1}}"#;
        let err = parse_simple_price(body, &default_assets(), capture_now()).unwrap_err();
        assert!(matches!(err, FetchError::MissingAsset(ref k) if k == "matic-network"));
    }

    #[test]
    fn test_missing_or_null_field_fails() {
        let assets = vec![TrackedAsset::new("bitcoin", "bitcoin")];

        let missing = br#"{"bitcoin": {"usd": 1.0, "usd_24h_change": 0.1}}"#;
        let err = parse_simple_price(missing, &assets, capture_now()).unwrap_err();
        assert!(matches!(err, FetchError::MissingField { field: "usd_market_cap", .. }));

        let null = br#"{"bitcoin": {"usd": 1.0, "usd_market_cap": 2.0, "usd_24h_change": null}}"#;
        let err = parse_simple_price(null, &assets, capture_now()).unwrap_err();
        assert!(matches!(err, FetchError::MissingField { field: "usd_24h_change", .. }));
    }

    #[test]
    fn test_negative_price_rejected_negative_change_allowed() {
        let assets = vec![TrackedAsset::new("bitcoin", "bitcoin")];

        let negative_price = br#"{"bitcoin": {"usd": -1.0, "usd_market_cap": 2.0, "usd_24h_change": 0.1}}"#;
        let err = parse_simple_price(negative_price, &assets, capture_now()).unwrap_err();
        assert!(matches!(err, FetchError::InvalidField { field: "usd", .. }));

        let negative_change = br#"{"bitcoin": {"usd": 1.0, "usd_market_cap": 2.0, "usd_24h_change": -12.5}}"#;
        let samples = parse_simple_price(negative_change, &assets, capture_now()).unwrap();
        assert_eq!(samples[&AssetId::new("bitcoin")].change_24h, -12.5);
    }

    #[test]
    fn test_extra_provider_entries_ignored() {
        let assets = vec![TrackedAsset::new("ethereum", "ethereum")];
        let samples = parse_simple_price(FULL_BODY.as_bytes(), &assets, capture_now()).unwrap();
        assert_eq!(samples.len(), 1);
    }
}
