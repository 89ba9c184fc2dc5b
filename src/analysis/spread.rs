use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::types::{
    is_usable_price, ArbitrageAnalysis, ArbitrageRecommendation, Asset, Confidence,
    CrossExchangeOpportunity,
};

/// Spread above which a profitable mint gets HIGH confidence (percent).
const HIGH_CONFIDENCE_SPREAD: f64 = 10.0;
/// Spreads below this are almost certainly bad data, but still surfaced (percent).
const ANOMALY_SPREAD: f64 = -75.0;

/// Mint-and-sell and cross-source spread analysis.
pub struct SpreadAnalyzer {
    min_profit_percent: f64,
}

impl SpreadAnalyzer {
    pub fn new(min_profit_percent: f64) -> Self {
        Self { min_profit_percent }
    }

    pub fn analyze_mint_arbitrage(
        &self,
        mint_cost: f64,
        market_price: f64,
        mint_rate: f64,
    ) -> ArbitrageAnalysis {
        let spread_usd = market_price - mint_cost;
        let spread_percent = if mint_cost > 0.0 {
            spread_usd / mint_cost * 100.0
        } else {
            0.0
        };

        let is_profitable = spread_percent >= self.min_profit_percent;
        let (recommendation, confidence) = if is_profitable {
            let confidence = if spread_percent > HIGH_CONFIDENCE_SPREAD {
                Confidence::High
            } else {
                Confidence::Medium
            };
            (ArbitrageRecommendation::MintAndSell, confidence)
        } else if spread_percent < 0.0 {
            (ArbitrageRecommendation::Hold, Confidence::High)
        } else {
            (ArbitrageRecommendation::Monitor, Confidence::Low)
        };

        if is_profitable {
            warn!(
                spread_percent,
                "MINT ARBITRAGE: mint at ${mint_cost:.2}, sell at ${market_price:.2}, spread +{spread_percent:.2}% (+${spread_usd:.2} per DIEM)"
            );
        } else if spread_percent.abs() > 50.0 {
            info!(
                spread_percent,
                "large spread: {spread_percent:.2}% (mint ${mint_cost:.2}, market ${market_price:.2})"
            );
        }

        ArbitrageAnalysis {
            mint_cost,
            market_price,
            mint_rate,
            spread_usd,
            spread_percent,
            is_profitable,
            recommendation,
            confidence,
            estimated_profit_per_unit: spread_usd.max(0.0),
        }
    }

    /// Profitable spreads, and extreme negative ones that point at a data problem.
    pub fn should_alert(&self, analysis: &ArbitrageAnalysis) -> bool {
        analysis.is_profitable || analysis.spread_percent < ANOMALY_SPREAD
    }
}

/// Cheapest vs dearest source for one asset. Needs at least two usable prices.
pub fn detect_cross_exchange(
    asset: Asset,
    prices: &BTreeMap<String, Option<f64>>,
    min_spread_percent: f64,
) -> Option<CrossExchangeOpportunity> {
    let valid: Vec<(&String, f64)> = prices
        .iter()
        .filter_map(|(source, price)| price.filter(|p| is_usable_price(*p)).map(|p| (source, p)))
        .collect();

    if valid.len() < 2 {
        return None;
    }

    let (buy_source, buy_price) = valid
        .iter()
        .copied()
        .min_by(|a, b| a.1.total_cmp(&b.1))?;
    let (sell_source, sell_price) = valid
        .iter()
        .copied()
        .max_by(|a, b| a.1.total_cmp(&b.1))?;

    let spread_usd = sell_price - buy_price;
    let spread_percent = spread_usd / buy_price * 100.0;

    if spread_percent < min_spread_percent {
        return None;
    }

    warn!(
        asset = %asset,
        spread_percent,
        "cross-exchange arbitrage: buy on {buy_source} (${buy_price:.2}), sell on {sell_source} (${sell_price:.2}), spread {spread_percent:.2}%"
    );

    Some(CrossExchangeOpportunity {
        asset,
        buy_source: buy_source.clone(),
        buy_price,
        sell_source: sell_source.clone(),
        sell_price,
        spread_usd,
        spread_percent,
    })
}
