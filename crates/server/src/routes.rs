use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use coinstats_query::{Deviation, Snapshot};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CoinQuery {
    coin: Option<String>,
}

/// Assemble the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/stats", get(api_stats))
        .route("/deviation", get(api_deviation))
        .route("/health", get(health))
        .with_state(state)
}

/// GET /stats?coin=<id> - latest price, market cap and 24h change
async fn api_stats(
    State(state): State<AppState>,
    Query(q): Query<CoinQuery>,
) -> Result<Json<Snapshot>, ApiError> {
    let snapshot = state.query.latest_snapshot(q.coin.as_deref()).await?;
    Ok(Json(snapshot))
}

/// GET /deviation?coin=<id> - price standard deviation over recent samples
async fn api_deviation(
    State(state): State<AppState>,
    Query(q): Query<CoinQuery>,
) -> Result<Json<Deviation>, ApiError> {
    let deviation = state.query.deviation(q.coin.as_deref()).await?;
    Ok(Json(deviation))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let (status, store) = match state.query.store().stats().await {
        Ok(stats) => ("ok", json!(stats)),
        Err(e) => ("degraded", json!({ "error": e.to_string() })),
    };

    let ingestion = state
        .scheduler
        .as_ref()
        .map(|s| json!(s.stats()))
        .unwrap_or(Value::Null);

    Json(json!({
        "status": status,
        "uptime_secs": state.started_at.elapsed().as_secs(),
        "store": store,
        "ingestion": ingestion,
    }))
}
