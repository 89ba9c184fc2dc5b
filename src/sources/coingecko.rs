use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::config::{COINGECKO_MIN_INTERVAL_MS, SOURCE_TIMEOUT_SECS};
use crate::error::{AppError, Result};
use crate::sources::{Quote, QuoteSource, RateLimiter};
use crate::types::Asset;

/// CoinGecko `/simple/price`. Works without a key on the free tier.
pub struct CoinGeckoSource {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    limiter: RateLimiter,
}

impl CoinGeckoSource {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(SOURCE_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key,
            limiter: RateLimiter::new(Duration::from_millis(COINGECKO_MIN_INTERVAL_MS)),
        })
    }

    pub fn coin_id(asset: Asset) -> &'static str {
        match asset {
            Asset::Vvv => "venice-token",
            Asset::Diem => "venice-ai",
        }
    }
}

#[async_trait]
impl QuoteSource for CoinGeckoSource {
    fn name(&self) -> &str {
        "coingecko"
    }

    async fn fetch_quote(&self, asset: Asset) -> Result<Quote> {
        let coin_id = Self::coin_id(asset);
        let url = format!(
            "{}/simple/price?ids={}&vs_currencies=usd&include_24hr_vol=true",
            self.base_url, coin_id
        );

        self.limiter.wait().await;

        let mut request = self.client.get(&url);
        if let Some(key) = &self.api_key {
            request = request.header("x-cg-pro-api-key", key);
        }

        let resp = request.send().await?.error_for_status()?;
        let body: serde_json::Value = resp.json().await?;
        let quote = parse_simple_price(&body, coin_id)?;

        debug!(asset = %asset, price = quote.price, "coingecko quote");
        Ok(quote)
    }
}

/// Extracts `{ "<id>": { "usd": .., "usd_24h_vol": .. } }`.
pub fn parse_simple_price(body: &serde_json::Value, coin_id: &str) -> Result<Quote> {
    let entry = body
        .get(coin_id)
        .ok_or_else(|| AppError::Source(format!("coingecko: {coin_id} missing from response")))?;

    let price = entry
        .get("usd")
        .and_then(|v| v.as_f64())
        .ok_or_else(|| AppError::Source(format!("coingecko: no usd price for {coin_id}")))?;

    if !(price.is_finite() && price > 0.0) {
        return Err(AppError::Source(format!(
            "coingecko: non-positive price {price} for {coin_id}"
        )));
    }

    let volume_24h = entry
        .get("usd_24h_vol")
        .and_then(|v| v.as_f64())
        .filter(|v| v.is_finite() && *v >= 0.0);

    Ok(Quote { price, volume_24h })
}
