use serde::{Deserialize, Serialize};

use crate::config::NOTIFICATION_CATEGORY;
use crate::types::{
    ArbitrageAnalysis, CrossExchangeOpportunity, SignalAnalysis, ValuationAnalysis, ValuationSignal,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    MintArbitrage,
    Valuation,
    Momentum,
    CrossExchange,
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AlertKind::MintArbitrage => "mint_arbitrage",
            AlertKind::Valuation => "valuation",
            AlertKind::Momentum => "momentum",
            AlertKind::CrossExchange => "cross_exchange",
        };
        write!(f, "{s}")
    }
}

/// Transport-agnostic alert payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub title: String,
    pub message: String,
    pub priority: Priority,
    pub category: String,
    pub data: serde_json::Value,
}

impl Notification {
    pub fn new(title: String, message: String, priority: Priority, data: serde_json::Value) -> Self {
        Self {
            title,
            message,
            priority,
            category: NOTIFICATION_CATEGORY.to_string(),
            data,
        }
    }
}

fn payload<T: Serialize>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
}

pub fn arbitrage_alert(a: &ArbitrageAnalysis) -> Notification {
    let message = format!(
        "Spread: {:+.2}% ({:+.2} USD)\nMint Cost: ${:.2}\nMarket Price: ${:.2}\nAction: {}",
        a.spread_percent, a.spread_usd, a.mint_cost, a.market_price, a.recommendation
    );
    let priority = if a.spread_percent.abs() > 10.0 {
        Priority::High
    } else {
        Priority::Medium
    };
    Notification::new("DIEM Arbitrage Opportunity".to_string(), message, priority, payload(a))
}

pub fn valuation_alert(v: &ValuationAnalysis) -> Notification {
    let discount = (v.dcf_value - v.market_price) / v.dcf_value * 100.0;
    let message = format!(
        "Market: ${:.2}\nFair Value: ${:.2}\nDiscount: {discount:.1}%\n{}",
        v.market_price, v.dcf_value, v.rationale
    );
    let priority = if v.buy_signal == ValuationSignal::StrongBuy {
        Priority::High
    } else {
        Priority::Medium
    };
    Notification::new(format!("DIEM Valuation: {}", v.buy_signal), message, priority, payload(v))
}

pub fn momentum_alert(s: &SignalAnalysis) -> Notification {
    let rsi = s.rsi.map_or_else(|| "N/A".to_string(), |r| format!("{r:.1}"));
    let kinds: Vec<String> = s.signals.iter().map(|sig| sig.kind.to_string()).collect();
    let summary = if kinds.is_empty() {
        "None".to_string()
    } else {
        kinds.join(", ")
    };
    let message = format!(
        "Price: ${:.4}\nRSI: {rsi}\nScore: {}\nSignals: {summary}",
        s.current_price, s.score
    );
    let priority = if s.score >= 5 {
        Priority::High
    } else {
        Priority::Medium
    };
    Notification::new(format!("VVV {}", s.recommendation), message, priority, payload(s))
}

pub fn cross_exchange_alert(o: &CrossExchangeOpportunity) -> Notification {
    let message = format!(
        "Buy: {} @ ${:.2}\nSell: {} @ ${:.2}\nSpread: {:.2}% (${:.2})",
        o.buy_source, o.buy_price, o.sell_source, o.sell_price, o.spread_percent, o.spread_usd
    );
    Notification::new(
        format!("Cross-Exchange {} Arbitrage", o.asset),
        message,
        Priority::High,
        payload(o),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{IntrinsicValueCalculator, SpreadAnalyzer};
    use crate::types::Asset;

    #[test]
    fn arbitrage_priority_follows_spread_size() {
        let analyzer = SpreadAnalyzer::new(5.0);
        let small = arbitrage_alert(&analyzer.analyze_mint_arbitrage(100.0, 106.0, 100.0));
        assert_eq!(small.priority, Priority::Medium);
        assert!(small.message.contains("Action: MINT_AND_SELL"));

        let wide = arbitrage_alert(&analyzer.analyze_mint_arbitrage(100.0, 115.0, 100.0));
        assert_eq!(wide.priority, Priority::High);
        assert_eq!(wide.category, "venice_monitor");
        assert_eq!(wide.data["recommendation"], "MINT_AND_SELL");
    }

    #[test]
    fn valuation_alert_carries_signal_in_title() {
        let v = IntrinsicValueCalculator::new(0.25).analyze_valuation(250.0, 200.0);
        let n = valuation_alert(&v);
        assert_eq!(n.title, "DIEM Valuation: STRONG_BUY");
        assert_eq!(n.priority, Priority::High);
        assert_eq!(n.data["buy_signal"], "STRONG_BUY");
    }

    #[test]
    fn cross_exchange_alert_is_high_priority() {
        let n = cross_exchange_alert(&CrossExchangeOpportunity {
            asset: Asset::Diem,
            buy_source: "coingecko".to_string(),
            buy_price: 240.0,
            sell_source: "coinmarketcap".to_string(),
            sell_price: 260.0,
            spread_usd: 20.0,
            spread_percent: 8.33,
        });
        assert_eq!(n.priority, Priority::High);
        assert!(n.message.starts_with("Buy: coingecko @ $240.00"));
    }

    #[test]
    fn priority_serializes_lowercase() {
        assert_eq!(serde_json::to_value(Priority::Urgent).unwrap(), "urgent");
    }
}
