use std::time::Duration;

use tracing::{debug, warn};

use crate::config::SOURCE_TIMEOUT_SECS;
use crate::error::{AppError, Result};
use crate::types::{now_ns, MintRateSample};

/// Mint rate at launch, in sVVV per DIEM.
pub const BASE_MINT_RATE: f64 = 90.0;
/// Supply at which the exponent reaches `ADJUSTMENT_POWER`.
pub const TARGET_DIEM_SUPPLY: f64 = 38_000.0;
pub const ADJUSTMENT_POWER: f64 = 3.0;

/// Resolves the current mint rate, live or estimated, and prices a mint.
pub struct MintCalculator {
    client: reqwest::Client,
    api_url: String,
    supply_estimate: f64,
}

impl MintCalculator {
    pub fn new(api_url: impl Into<String>, supply_estimate: f64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(SOURCE_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            api_url: api_url.into(),
            supply_estimate,
        })
    }

    /// Reads `mint_rate` from the protocol endpoint.
    pub async fn fetch_live_rate(&self) -> Result<f64> {
        let body: serde_json::Value = self
            .client
            .get(&self.api_url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        parse_mint_rate(&body)
    }

    /// Live rate if the endpoint answers, otherwise the formula estimate.
    /// Never fails.
    pub async fn current_rate(&self) -> MintRateSample {
        match self.fetch_live_rate().await {
            Ok(rate) => {
                debug!(rate, "live mint rate");
                MintRateSample {
                    rate,
                    estimated: false,
                    recorded_at_ns: now_ns(),
                }
            }
            Err(e) => {
                let rate = estimate_mint_rate(Some(self.supply_estimate));
                warn!(
                    estimated_rate = rate,
                    "live mint rate unavailable, using estimate: {e}"
                );
                MintRateSample {
                    rate,
                    estimated: true,
                    recorded_at_ns: now_ns(),
                }
            }
        }
    }
}

pub fn parse_mint_rate(body: &serde_json::Value) -> Result<f64> {
    let rate = body
        .get("mint_rate")
        .and_then(|v| v.as_f64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
        .ok_or_else(|| AppError::Source("mint rate response has no mint_rate".to_string()))?;
    if !(rate.is_finite() && rate > 0.0) {
        return Err(AppError::Source(format!("non-positive mint rate {rate}")));
    }
    Ok(rate)
}

/// `BASE_MINT_RATE * exp(ADJUSTMENT_POWER * (supply / TARGET_DIEM_SUPPLY)^3)`.
/// Unknown supply falls back to the placeholder estimate.
pub fn estimate_mint_rate(current_supply: Option<f64>) -> f64 {
    let supply = current_supply.unwrap_or(crate::config::DEFAULT_DIEM_SUPPLY_ESTIMATE);
    let ratio = supply / TARGET_DIEM_SUPPLY;
    BASE_MINT_RATE * (ADJUSTMENT_POWER * ratio.powi(3)).exp()
}

/// USD cost of minting one DIEM. Not clamped: callers must guard any
/// division by a non-positive result.
pub fn mint_cost(mint_rate: f64, collateral_price: f64) -> f64 {
    mint_rate * collateral_price
}
