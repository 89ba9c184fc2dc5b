use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::config::{COINMARKETCAP_MIN_INTERVAL_MS, SOURCE_TIMEOUT_SECS};
use crate::error::{AppError, Result};
use crate::sources::{Quote, QuoteSource, RateLimiter};
use crate::types::Asset;

/// CoinMarketCap `/cryptocurrency/quotes/latest`. Requires an API key.
pub struct CoinMarketCapSource {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    limiter: RateLimiter,
}

impl CoinMarketCapSource {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(SOURCE_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            limiter: RateLimiter::new(Duration::from_millis(COINMARKETCAP_MIN_INTERVAL_MS)),
        })
    }

    pub fn token_id(asset: Asset) -> u32 {
        match asset {
            Asset::Vvv => 31991,
            Asset::Diem => 33947,
        }
    }
}

#[async_trait]
impl QuoteSource for CoinMarketCapSource {
    fn name(&self) -> &str {
        "coinmarketcap"
    }

    async fn fetch_quote(&self, asset: Asset) -> Result<Quote> {
        let token_id = Self::token_id(asset);
        let url = format!(
            "{}/cryptocurrency/quotes/latest?id={}&convert=USD",
            self.base_url, token_id
        );

        self.limiter.wait().await;

        let resp = self
            .client
            .get(&url)
            .header("X-CMC_PRO_API_KEY", &self.api_key)
            .header("Accept", "application/json")
            .send()
            .await?
            .error_for_status()?;
        let body: serde_json::Value = resp.json().await?;
        let quote = parse_latest_quote(&body, token_id)?;

        debug!(asset = %asset, price = quote.price, "coinmarketcap quote");
        Ok(quote)
    }
}

/// Extracts `data.<id>.quote.USD.{price, volume_24h}`.
pub fn parse_latest_quote(body: &serde_json::Value, token_id: u32) -> Result<Quote> {
    let usd = body
        .get("data")
        .and_then(|d| d.get(token_id.to_string()))
        .and_then(|t| t.get("quote"))
        .and_then(|q| q.get("USD"))
        .ok_or_else(|| AppError::Source(format!("coinmarketcap: no USD quote for id {token_id}")))?;

    let price = usd
        .get("price")
        .and_then(|v| v.as_f64())
        .ok_or_else(|| AppError::Source(format!("coinmarketcap: no price for id {token_id}")))?;

    if !(price.is_finite() && price > 0.0) {
        return Err(AppError::Source(format!(
            "coinmarketcap: non-positive price {price} for id {token_id}"
        )));
    }

    let volume_24h = usd
        .get("volume_24h")
        .and_then(|v| v.as_f64())
        .filter(|v| v.is_finite() && *v >= 0.0);

    Ok(Quote { price, volume_24h })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_nested_quote() {
        let body = json!({
            "data": { "33947": { "quote": { "USD": { "price": 248.9, "volume_24h": 5400.5 } } } }
        });
        let quote = parse_latest_quote(&body, 33947).unwrap();
        assert_eq!(quote.price, 248.9);
        assert_eq!(quote.volume_24h, Some(5400.5));
    }

    #[test]
    fn null_price_is_an_error() {
        let body = json!({ "data": { "31991": { "quote": { "USD": { "price": null } } } } });
        assert!(parse_latest_quote(&body, 31991).is_err());
    }

    #[test]
    fn wrong_id_is_an_error() {
        let body = json!({ "data": { "31991": { "quote": { "USD": { "price": 1.0 } } } } });
        assert!(parse_latest_quote(&body, 33947).is_err());
    }
}
