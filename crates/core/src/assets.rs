//! Tracked asset table
//!
//! Maps our asset ids to the provider's lookup keys. The table is static
//! configuration: it is never discovered from provider responses.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::{AssetId, ConfigError};

/// An asset we sample on every ingestion cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedAsset {
    pub id: AssetId,
    pub provider_key: String,
}

impl TrackedAsset {
    pub fn new(id: &str, provider_key: &str) -> Self {
        Self {
            id: AssetId::new(id),
            provider_key: provider_key.trim().to_string(),
        }
    }
}

/// Default table used when configuration does not override it
pub static DEFAULT_ASSETS: LazyLock<Vec<TrackedAsset>> = LazyLock::new(|| {
    vec![
        TrackedAsset::new("bitcoin", "bitcoin"),
        TrackedAsset::new("matic", "matic-network"), // provider id differs from ours
        TrackedAsset::new("ethereum", "ethereum"),
    ]
});

pub fn default_assets() -> Vec<TrackedAsset> {
    DEFAULT_ASSETS.clone()
}

/// Reject tables the fetcher cannot map one-to-one
pub fn validate_assets(assets: &[TrackedAsset]) -> Result<(), ConfigError> {
    if assets.is_empty() {
        return Err(ConfigError::Invalid("asset table is empty".to_string()));
    }

    let mut ids = HashSet::new();
    let mut keys = HashSet::new();
    for asset in assets {
        if asset.id.as_str().is_empty() || asset.provider_key.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "asset entry has a blank id or provider key: {:?}",
                asset
            )));
        }
        if !ids.insert(asset.id.clone()) {
            return Err(ConfigError::Invalid(format!("duplicate asset id: {}", asset.id)));
        }
        if !keys.insert(asset.provider_key.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "duplicate provider key: {}",
                asset.provider_key
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table() {
        let assets = default_assets();
        assert_eq!(assets.len(), 3);

        let matic = assets.iter().find(|a| a.id.as_str() == "matic").unwrap();
        assert_eq!(matic.provider_key, "matic-network");
        assert!(validate_assets(&assets).is_ok());
    }

    #[test]
    fn test_duplicates_rejected() {
        let dup_id = vec![
            TrackedAsset::new("bitcoin", "bitcoin"),
            TrackedAsset::new("BITCOIN", "wrapped-bitcoin"),
        ];
        assert!(validate_assets(&dup_id).is_err());

        let dup_key = vec![
            TrackedAsset::new("btc", "bitcoin"),
            TrackedAsset::new("bitcoin", "bitcoin"),
        ];
        assert!(validate_assets(&dup_key).is_err());
    }

    #[test]
    fn test_empty_table_rejected() {
        assert!(validate_assets(&[]).is_err());
        assert!(validate_assets(&[TrackedAsset::new("  ", "bitcoin")]).is_err());
    }
}
