//! Error types

use thiserror::Error;

use crate::AssetId;

/// Price provider errors. Any of these fails the whole fetch.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Provider request failed: {0}")]
    Request(String),

    #[error("Provider returned status {0}")]
    Status(u16),

    #[error("Malformed provider body: {0}")]
    MalformedBody(String),

    #[error("Asset missing from provider response: {0}")]
    MissingAsset(String),

    #[error("Field {field} missing for {provider_key}")]
    MissingField {
        provider_key: String,
        field: &'static str,
    },

    #[error("Field {field} for {provider_key} is out of range: {value}")]
    InvalidField {
        provider_key: String,
        field: &'static str,
        value: f64,
    },
}

/// Time-series store errors, distinct from "no data"
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),
}

/// Read query errors
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Missing parameter: {0}")]
    MissingParameter(&'static str),

    #[error("No history for {0}")]
    NotFound(AssetId),

    #[error("Not enough data for {asset}: {available} sample(s), need {required}")]
    InsufficientData {
        asset: AssetId,
        available: usize,
        required: usize,
    },

    #[error(transparent)]
    Storage(#[from] StoreError),
}

/// Configuration errors, raised at startup only
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Result type alias
pub type FetchResult<T> = Result<T, FetchError>;
pub type StoreResult<T> = Result<T, StoreError>;
pub type QueryResult<T> = Result<T, QueryError>;
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_stays_distinct_from_not_found() {
        let err: QueryError = StoreError::Unavailable("pool timed out".into()).into();
        assert!(matches!(err, QueryError::Storage(StoreError::Unavailable(_))));
        assert_eq!(err.to_string(), "Store unavailable: pool timed out");
    }

    #[test]
    fn test_fetch_error_messages() {
        let err = FetchError::MissingField {
            provider_key: "matic-network".into(),
            field: "usd_market_cap",
        };
        assert_eq!(err.to_string(), "Field usd_market_cap missing for matic-network");
    }
}
