//! Crypto stats service
//!
//! Main entry point: ingestion scheduler plus HTTP read endpoints

use std::sync::Arc;

use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use coinstats_core::StatsConfig;
use coinstats_price_feed::{CoinGeckoFeed, FeedConfig, IngestionScheduler, SchedulerConfig};
use coinstats_query::QueryService;
use coinstats_server::{AppState, HttpServerBuilder};
use coinstats_store::{MemoryStore, SqliteStore, TimeSeriesStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    info!("Starting coinstats v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = StatsConfig::load()?;

    let store: Arc<dyn TimeSeriesStore> = match &config.store.sqlite_path {
        Some(path) => Arc::new(SqliteStore::open(path, config.store.pool_size)?),
        None => {
            warn!("No store.sqlite_path configured, history is kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };

    let feed = CoinGeckoFeed::new(FeedConfig::from(&config.provider))?;
    let scheduler = Arc::new(IngestionScheduler::new(
        SchedulerConfig::from(&config.ingestion),
        config.assets.clone(),
        Arc::new(feed),
        Arc::clone(&store),
    ));

    let query = QueryService::new(store).with_window(config.query.deviation_window);

    // Setup shutdown channel
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Spawn shutdown signal handler
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = signal::ctrl_c().await {
                error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
                }
                Err(e) => {
                    error!("Failed to install signal handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received Ctrl+C");
            }
            _ = terminate => {
                info!("Received termination signal");
            }
        }

        let _ = shutdown_tx.send(true);
    });

    // Start ingestion
    let ingestion = {
        let scheduler = Arc::clone(&scheduler);
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move { scheduler.run(shutdown).await })
    };

    // Start server
    let state = AppState::new(query).with_scheduler(scheduler);
    let server = HttpServerBuilder::new()
        .host(config.server.host.clone())
        .port(config.server.port)
        .build(state);

    if let Err(e) = server.start_with_shutdown(shutdown_rx).await {
        error!("Server error: {}", e);
        ingestion.abort();
        return Err(e);
    }

    if let Err(e) = ingestion.await {
        warn!("Ingestion task ended abnormally: {}", e);
    }

    info!("Server shutdown complete");
    Ok(())
}
