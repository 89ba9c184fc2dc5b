//! Row types for the history tables in `migrations/`.

use serde::Serialize;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PriceRow {
    pub id: i64,
    pub asset: String,
    pub price: f64,
    pub source: String,
    pub volume_24h: Option<f64>,
    pub recorded_at: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MintRateRow {
    pub id: i64,
    pub mint_rate: f64,
    pub estimated: bool,
    pub recorded_at: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct AlertRow {
    pub id: i64,
    pub kind: String,
    pub title: String,
    pub message: String,
    pub priority: String,
    pub recorded_at: i64,
}
