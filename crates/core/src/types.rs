//! Core type definitions

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Case-folded asset identifier (e.g. "bitcoin")
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct AssetId(String);

impl AssetId {
    /// Build an id from free text. Surrounding whitespace is dropped and the
    /// remainder lowercased, so `" BitCoin "` and `"bitcoin"` are the same asset.
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_lowercase())
    }

    /// Like `new`, but `None` when nothing is left after trimming
    pub fn parse(raw: &str) -> Option<Self> {
        let id = Self::new(raw);
        if id.0.is_empty() {
            None
        } else {
            Some(id)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for AssetId {
    fn from(raw: String) -> Self {
        Self::new(&raw)
    }
}

impl From<&str> for AssetId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<AssetId> for String {
    fn from(id: AssetId) -> Self {
        id.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One price observation for an asset at a capture instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub asset: AssetId,
    pub price_usd: f64,
    pub market_cap_usd: f64,
    pub change_24h: f64,
    pub captured_at: DateTime<Utc>,
}

impl Sample {
    pub fn captured_at_ms(&self) -> i64 {
        self.captured_at.timestamp_millis()
    }
}

/// Current UTC instant truncated to whole milliseconds.
///
/// Stores keep capture times at millisecond resolution; truncating at the
/// source keeps a written sample equal to the one read back.
pub fn capture_now() -> DateTime<Utc> {
    from_millis(Utc::now().timestamp_millis())
}

/// Convert epoch milliseconds back into a capture instant
pub fn from_millis(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}
