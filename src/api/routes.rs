use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::api::health::{HealthSnapshot, HealthState};
use crate::api::latency::{SourceLatency, SourceLatencySummary};
use crate::db::models::{AlertRow, MintRateRow, PriceRow};
use crate::db::PriceHistory;
use crate::error::AppError;
use crate::types::Asset;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 1_000;

#[derive(Clone)]
pub struct ApiState {
    pub history: PriceHistory,
    pub health: Arc<HealthState>,
    pub latency: Arc<SourceLatency>,
    /// Default window for /prices when `days` is not given.
    pub history_days: u32,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/prices/:asset", get(get_prices))
        .route("/mint-rates", get(get_mint_rates))
        .route("/alerts/recent", get(get_recent_alerts))
        .route("/stats/latency", get(get_stats_latency))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Query param structs
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct PricesQuery {
    pub days: Option<u32>,
    pub limit: Option<i64>,
}

#[derive(Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_health(State(state): State<ApiState>) -> Json<HealthSnapshot> {
    Json(state.health.snapshot())
}

async fn get_prices(
    State(state): State<ApiState>,
    Path(asset): Path<String>,
    Query(params): Query<PricesQuery>,
) -> Result<Json<Vec<PriceRow>>, AppError> {
    let asset: Asset = asset.parse().map_err(AppError::BadRequest)?;
    let days = params.days.unwrap_or(state.history_days);
    let rows = state
        .history
        .price_rows(asset, days, clamp_limit(params.limit.or(Some(MAX_LIMIT))))
        .await?;
    Ok(Json(rows))
}

async fn get_mint_rates(
    State(state): State<ApiState>,
    Query(params): Query<LimitQuery>,
) -> Result<Json<Vec<MintRateRow>>, AppError> {
    let rows = state.history.recent_mint_rates(clamp_limit(params.limit)).await?;
    Ok(Json(rows))
}

async fn get_recent_alerts(
    State(state): State<ApiState>,
    Query(params): Query<LimitQuery>,
) -> Result<Json<Vec<AlertRow>>, AppError> {
    let rows = state.history.recent_alerts(clamp_limit(params.limit)).await?;
    Ok(Json(rows))
}

async fn get_stats_latency(State(state): State<ApiState>) -> Json<Vec<SourceLatencySummary>> {
    Json(state.latency.summaries())
}
