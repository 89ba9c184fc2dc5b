//! In-memory latency histograms for quote source instrumentation.
//! Records the wall time of each `fetch_quote` call, keyed by source name.

use std::sync::Mutex;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;

/// One histogram. Values stored in microseconds.
pub struct LatencyStats {
    inner: Mutex<hdrhistogram::Histogram<u64>>,
}

impl LatencyStats {
    /// Create a new histogram. Tracks 1us to 100s, 3 significant figures.
    pub fn new() -> Self {
        let histogram = hdrhistogram::Histogram::new_with_bounds(1, 100_000_000, 3)
            .expect("valid histogram bounds");
        Self {
            inner: Mutex::new(histogram),
        }
    }

    /// Record a fetch latency in microseconds.
    pub fn record_us(&self, us: u64) {
        if let Ok(mut h) = self.inner.lock() {
            let _ = h.record(us.clamp(1, 100_000_000));
        }
    }

    pub fn record(&self, d: Duration) {
        let us = d.as_micros().min(u128::from(u64::MAX)) as u64;
        self.record_us(us);
    }

    /// Return (p50_us, p95_us, p99_us). None if no samples.
    pub fn percentiles(&self) -> (Option<u64>, Option<u64>, Option<u64>) {
        let Ok(h) = self.inner.lock() else {
            return (None, None, None);
        };
        if h.len() == 0 {
            return (None, None, None);
        }
        let p50 = h.value_at_quantile(0.5);
        let p95 = h.value_at_quantile(0.95);
        let p99 = h.value_at_quantile(0.99);
        (Some(p50), Some(p95), Some(p99))
    }

    /// Sample count.
    pub fn len(&self) -> u64 {
        self.inner.lock().map(|h| h.len()).unwrap_or(0)
    }
}

impl Default for LatencyStats {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize)]
pub struct SourceLatencySummary {
    pub source: String,
    pub samples: u64,
    pub p50_ms: Option<f64>,
    pub p95_ms: Option<f64>,
    pub p99_ms: Option<f64>,
}

/// Per-source histograms. The aggregator records, the API reads.
#[derive(Default)]
pub struct SourceLatency {
    by_source: DashMap<String, LatencyStats>,
}

impl SourceLatency {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, source: &str, d: Duration) {
        if let Some(stats) = self.by_source.get(source) {
            stats.record(d);
            return;
        }
        self.by_source.entry(source.to_string()).or_default().record(d);
    }

    /// Summaries sorted by source name.
    pub fn summaries(&self) -> Vec<SourceLatencySummary> {
        let to_ms = |us: Option<u64>| us.map(|v| v as f64 / 1_000.0);
        let mut out: Vec<SourceLatencySummary> = self
            .by_source
            .iter()
            .map(|entry| {
                let (p50, p95, p99) = entry.value().percentiles();
                SourceLatencySummary {
                    source: entry.key().clone(),
                    samples: entry.value().len(),
                    p50_ms: to_ms(p50),
                    p95_ms: to_ms(p95),
                    p99_ms: to_ms(p99),
                }
            })
            .collect();
        out.sort_by(|a, b| a.source.cmp(&b.source));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_histogram_has_no_percentiles() {
        let stats = LatencyStats::new();
        assert_eq!(stats.percentiles(), (None, None, None));
        assert_eq!(stats.len(), 0);
    }

    #[test]
    fn records_are_kept_per_source() {
        let latency = SourceLatency::new();
        latency.record("coingecko", Duration::from_millis(120));
        latency.record("coingecko", Duration::from_millis(80));
        latency.record("coinmarketcap", Duration::from_millis(300));

        let summaries = latency.summaries();
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].source, "coingecko");
        assert_eq!(summaries[0].samples, 2);
        assert_eq!(summaries[1].source, "coinmarketcap");
        let p50 = summaries[1].p50_ms.unwrap();
        assert!((p50 - 300.0).abs() < 1.0);
    }
}
