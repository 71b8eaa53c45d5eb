//! Configuration types
//!
//! Layered, lowest precedence first: built-in defaults, an optional
//! `coinstats.toml`, `COINSTATS__*` environment variables, then the bare
//! `PORT` variable for the listen port.

use config::builder::DefaultState;
use config::{ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::{default_assets, validate_assets, ConfigError, ConfigResult, TrackedAsset};

/// Config file read when `COINSTATS_CONFIG` is not set
pub const DEFAULT_CONFIG_FILE: &str = "coinstats.toml";

/// Longest accepted ingestion interval (one year)
pub const MAX_INGESTION_INTERVAL_SECS: u64 = 365 * 24 * 60 * 60;

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// Price provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.coingecko.com/api/v3".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl ProviderConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Ingestion cadence
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    pub interval_secs: u64,
    pub run_on_start: bool,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            interval_secs: 2 * 60 * 60, // every two hours
            run_on_start: true,
        }
    }
}

impl IngestionConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Store selection. No `sqlite_path` means the in-memory store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub sqlite_path: Option<PathBuf>,
    pub pool_size: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            sqlite_path: None,
            pool_size: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub deviation_window: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            deviation_window: 100,
        }
    }
}

/// Complete service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    pub server: ServerConfig,
    pub provider: ProviderConfig,
    pub ingestion: IngestionConfig,
    pub store: StoreConfig,
    pub query: QueryConfig,
    pub assets: Vec<TrackedAsset>,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            provider: ProviderConfig::default(),
            ingestion: IngestionConfig::default(),
            store: StoreConfig::default(),
            query: QueryConfig::default(),
            assets: default_assets(),
        }
    }
}

impl StatsConfig {
    /// Load from the config file and process environment
    pub fn load() -> ConfigResult<Self> {
        let path = std::env::var("COINSTATS_CONFIG")
            .unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

        let builder = config::Config::builder()
            .add_source(File::with_name(&path).required(false))
            .add_source(
                Environment::with_prefix("COINSTATS")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("server.port", std::env::var("PORT").ok())?;

        Self::build(builder)
    }

    /// Load from an inline TOML document, without touching the environment
    pub fn from_toml_str(toml: &str) -> ConfigResult<Self> {
        let builder = config::Config::builder().add_source(File::from_str(toml, FileFormat::Toml));
        Self::build(builder)
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> ConfigResult<Self> {
        let cfg: Self = builder.build()?.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.ingestion.interval_secs == 0 {
            return Err(ConfigError::Invalid("ingestion.interval_secs must be > 0".into()));
        }
        if self.ingestion.interval_secs > MAX_INGESTION_INTERVAL_SECS {
            return Err(ConfigError::Invalid(format!(
                "ingestion.interval_secs must be <= {MAX_INGESTION_INTERVAL_SECS}"
            )));
        }
        if self.query.deviation_window < 2 {
            return Err(ConfigError::Invalid("query.deviation_window must be >= 2".into()));
        }
        if self.store.pool_size == 0 {
            return Err(ConfigError::Invalid("store.pool_size must be > 0".into()));
        }
        if self.provider.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("provider.base_url is empty".into()));
        }
        validate_assets(&self.assets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = StatsConfig::default();
        assert_eq!(cfg.ingestion.interval(), Duration::from_secs(7200));
        assert_eq!(cfg.query.deviation_window, 100);
        assert_eq!(cfg.server.port, 3000);
        assert!(cfg.store.sqlite_path.is_none());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_empty_document_gives_defaults() {
        let cfg = StatsConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.assets.len(), 3);
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.server.port, 3000);
    }

    #[test]
    fn test_toml_overrides() {
        let cfg = StatsConfig::from_toml_str(
            r#"
            [server]
            port = 8080

            [ingestion]
            interval_secs = 60

            [store]
            sqlite_path = "/var/lib/coinstats/samples.db"

            [[assets]]
            id = "Solana"
            provider_key = "solana"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.ingestion.interval_secs, 60);
        assert!(cfg.ingestion.run_on_start);
        assert_eq!(
            cfg.store.sqlite_path,
            Some(PathBuf::from("/var/lib/coinstats/samples.db"))
        );
        assert_eq!(cfg.assets, vec![TrackedAsset::new("solana", "solana")]);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(StatsConfig::from_toml_str("[ingestion]\ninterval_secs = 0").is_err());
        assert!(StatsConfig::from_toml_str("[query]\ndeviation_window = 1").is_err());
        assert!(StatsConfig::from_toml_str("assets = []").is_err());
    }

    #[test]
    fn test_interval_upper_bound() {
        let at_limit = format!("[ingestion]\ninterval_secs = {MAX_INGESTION_INTERVAL_SECS}");
        assert!(StatsConfig::from_toml_str(&at_limit).is_ok());

        let oversized = format!("[ingestion]\ninterval_secs = {}", u64::MAX / 2);
        let err = StatsConfig::from_toml_str(&oversized).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    // Only test touching the process environment; the rest go through
    // from_toml_str.
    #[test]
    fn test_load_layers_file_env_and_port() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coinstats.toml");
        std::fs::write(
            &path,
            "[server]\nport = 7000\n\n[ingestion]\ninterval_secs = 120\nrun_on_start = false\n",
        )
        .unwrap();

        std::env::set_var("COINSTATS_CONFIG", &path);
        std::env::remove_var("PORT");

        // File layer
        let cfg = StatsConfig::load().unwrap();
        assert_eq!(cfg.server.port, 7000);
        assert_eq!(cfg.ingestion.interval_secs, 120);
        assert!(!cfg.ingestion.run_on_start);

        // Prefixed env beats the file
        std::env::set_var("COINSTATS__SERVER__PORT", "8080");
        std::env::set_var("COINSTATS__QUERY__DEVIATION_WINDOW", "50");
        let cfg = StatsConfig::load().unwrap();
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.query.deviation_window, 50);
        assert_eq!(cfg.ingestion.interval_secs, 120);

        // Bare PORT beats everything
        std::env::set_var("PORT", "9090");
        let cfg = StatsConfig::load().unwrap();
        assert_eq!(cfg.server.port, 9090);

        // Env values are validated too
        std::env::set_var("COINSTATS__QUERY__DEVIATION_WINDOW", "1");
        assert!(matches!(StatsConfig::load(), Err(ConfigError::Invalid(_))));

        for key in [
            "COINSTATS_CONFIG",
            "COINSTATS__SERVER__PORT",
            "COINSTATS__QUERY__DEVIATION_WINDOW",
            "PORT",
        ] {
            std::env::remove_var(key);
        }
    }
}
