use std::sync::Arc;
use std::time::Instant;

use coinstats_price_feed::IngestionScheduler;
use coinstats_query::QueryService;

/// Shared application state, passed to all route handlers via `axum::extract::State`.
#[derive(Clone)]
pub struct AppState {
    pub query: QueryService,

    /// Present when ingestion runs in this process; reported by `/health`
    pub scheduler: Option<Arc<IngestionScheduler>>,

    pub started_at: Instant,
}

impl AppState {
    pub fn new(query: QueryService) -> Self {
        Self {
            query,
            scheduler: None,
            started_at: Instant::now(),
        }
    }

    pub fn with_scheduler(mut self, scheduler: Arc<IngestionScheduler>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }
}
