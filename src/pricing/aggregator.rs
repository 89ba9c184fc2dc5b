use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use futures_util::future::join_all;
use tracing::{debug, error, info, warn};

use crate::api::latency::SourceLatency;
use crate::sources::QuoteSource;
use crate::types::{is_usable_price, now_ns, AggregatedPrice, Asset, PricePoint};

/// Queries every configured quote source and reduces their answers to one
/// price per asset. A failing source never affects another source's result.
pub struct PriceAggregator {
    sources: Vec<Box<dyn QuoteSource>>,
    latency: Arc<SourceLatency>,
}

/// Every source's answer for one asset in one cycle, in source order.
/// `None` means the source failed or reported an unusable price.
#[derive(Debug, Clone)]
pub struct SourceSnapshot {
    pub asset: Asset,
    pub entries: Vec<(String, Option<PricePoint>)>,
}

impl PriceAggregator {
    pub fn new(sources: Vec<Box<dyn QuoteSource>>, latency: Arc<SourceLatency>) -> Self {
        if sources.is_empty() {
            warn!("price aggregator created with no quote sources");
        }
        Self { sources, latency }
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Fans out to all sources concurrently and collects each branch's
    /// outcome independently.
    pub async fn fetch_snapshot(&self, asset: Asset) -> SourceSnapshot {
        let fetches = self
            .sources
            .iter()
            .map(|source| self.fetch_one(source.as_ref(), asset));
        let entries = join_all(fetches).await;
        SourceSnapshot { asset, entries }
    }

    /// Median price for `asset` this cycle, or None if no source answered.
    pub async fn get_price(&self, asset: Asset) -> Option<AggregatedPrice> {
        self.fetch_snapshot(asset).await.aggregate()
    }

    async fn fetch_one(&self, source: &dyn QuoteSource, asset: Asset) -> (String, Option<PricePoint>) {
        let name = source.name().to_string();
        let started = Instant::now();
        let result = source.fetch_quote(asset).await;
        self.latency.record(&name, started.elapsed());

        let point = match result {
            Ok(quote) if is_usable_price(quote.price) => {
                debug!(asset = %asset, source = %name, price = quote.price, "source price");
                Some(PricePoint {
                    asset,
                    price: quote.price,
                    source: name.clone(),
                    volume_24h: quote.volume_24h,
                    fetched_at_ns: now_ns(),
                })
            }
            Ok(quote) => {
                warn!(asset = %asset, source = %name, price = quote.price, "discarding unusable price");
                None
            }
            Err(e) => {
                warn!(asset = %asset, source = %name, "price fetch failed: {e}");
                None
            }
        };
        (name, point)
    }
}

impl SourceSnapshot {
    pub fn points(&self) -> impl Iterator<Item = &PricePoint> {
        self.entries.iter().filter_map(|(_, p)| p.as_ref())
    }

    /// Per-source price map, failures included as `None`.
    pub fn price_map(&self) -> BTreeMap<String, Option<f64>> {
        self.entries
            .iter()
            .map(|(name, p)| (name.clone(), p.as_ref().map(|p| p.price)))
            .collect()
    }

    pub fn aggregate(&self) -> Option<AggregatedPrice> {
        let prices: Vec<f64> = self.points().map(|p| p.price).collect();
        let Some(value) = median(&prices) else {
            error!(asset = %self.asset, "no usable price from any source");
            return None;
        };

        let volumes: Vec<f64> = self.points().filter_map(|p| p.volume_24h).collect();
        let aggregated = AggregatedPrice {
            asset: self.asset,
            value,
            source_count: prices.len(),
            volume_24h: median(&volumes),
        };
        info!(
            asset = %self.asset,
            price = value,
            sources = prices.len(),
            "{} median price: ${value:.4} (from {} sources)",
            self.asset,
            prices.len(),
        );
        Some(aggregated)
    }
}

/// Statistical median; mean of the middle pair for even counts.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::testing::StaticSource;

    fn aggregator(sources: Vec<StaticSource>) -> PriceAggregator {
        let boxed = sources
            .into_iter()
            .map(|s| Box::new(s) as Box<dyn QuoteSource>)
            .collect();
        PriceAggregator::new(boxed, Arc::new(SourceLatency::new()))
    }

    #[test]
    fn median_of_odd_and_even_sets() {
        assert_eq!(median(&[1.05, 0.95, 1.00]), Some(1.00));
        assert_eq!(median(&[2.0, 4.0]), Some(3.0));
        assert_eq!(median(&[7.5]), Some(7.5));
        assert_eq!(median(&[]), None);
    }

    #[tokio::test]
    async fn median_of_three_sources() {
        let agg = aggregator(vec![
            StaticSource::new("a").with_price(Asset::Vvv, 1.00),
            StaticSource::new("b").with_price(Asset::Vvv, 1.05),
            StaticSource::new("c").with_price(Asset::Vvv, 0.95),
        ]);
        let price = agg.get_price(Asset::Vvv).await.unwrap();
        assert_eq!(price.value, 1.00);
        assert_eq!(price.source_count, 3);
    }

    #[tokio::test]
    async fn failing_and_unusable_sources_are_skipped() {
        let agg = aggregator(vec![
            StaticSource::new("down"),
            StaticSource::new("zero").with_price(Asset::Diem, 0.0),
            StaticSource::new("negative").with_price(Asset::Diem, -3.0),
            StaticSource::new("ok1").with_price(Asset::Diem, 240.0),
            StaticSource::new("ok2").with_price(Asset::Diem, 260.0),
        ]);
        let snapshot = agg.fetch_snapshot(Asset::Diem).await;
        assert_eq!(snapshot.entries.len(), 5);

        let price = snapshot.aggregate().unwrap();
        assert_eq!(price.value, 250.0);
        assert_eq!(price.source_count, 2);

        let map = snapshot.price_map();
        assert_eq!(map["down"], None);
        assert_eq!(map["zero"], None);
        assert_eq!(map["ok1"], Some(240.0));
    }

    #[tokio::test]
    async fn all_sources_failing_yields_no_price() {
        let agg = aggregator(vec![StaticSource::new("a"), StaticSource::new("b")]);
        assert!(agg.get_price(Asset::Vvv).await.is_none());
    }

    #[tokio::test]
    async fn volume_is_median_of_reporting_sources() {
        let agg = aggregator(vec![
            StaticSource::new("a").with_quote(Asset::Vvv, 1.0, 100.0),
            StaticSource::new("b").with_quote(Asset::Vvv, 1.1, 300.0),
            StaticSource::new("c").with_price(Asset::Vvv, 1.2),
        ]);
        let price = agg.get_price(Asset::Vvv).await.unwrap();
        assert_eq!(price.volume_24h, Some(200.0));
    }

    #[tokio::test]
    async fn latency_is_recorded_for_every_source() {
        let latency = Arc::new(SourceLatency::new());
        let agg = PriceAggregator::new(
            vec![
                Box::new(StaticSource::new("a").with_price(Asset::Vvv, 1.0)),
                Box::new(StaticSource::new("b")),
            ],
            Arc::clone(&latency),
        );
        agg.fetch_snapshot(Asset::Vvv).await;
        let summaries = latency.summaries();
        assert_eq!(summaries.len(), 2);
        assert!(summaries.iter().all(|s| s.samples == 1));
    }
}
