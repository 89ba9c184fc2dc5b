pub mod coingecko;
pub mod coinmarketcap;
pub mod rate_limit;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::Asset;

pub use coingecko::CoinGeckoSource;
pub use coinmarketcap::CoinMarketCapSource;
pub use rate_limit::RateLimiter;

/// Raw quote as reported by one provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quote {
    pub price: f64,
    pub volume_24h: Option<f64>,
}

/// Anything that can price a tracked asset in USD. Providers are
/// interchangeable from the aggregator's point of view.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch_quote(&self, asset: Asset) -> Result<Quote>;
}
