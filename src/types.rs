use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

// ---------------------------------------------------------------------------
// Assets
// ---------------------------------------------------------------------------

/// The two tracked tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Asset {
    /// Collateral token; its price feeds the mint cost.
    Vvv,
    /// Valued token; modeled as a perpetuity of daily API credit.
    Diem,
}

impl Asset {
    pub const ALL: [Asset; 2] = [Asset::Vvv, Asset::Diem];

    pub fn symbol(&self) -> &'static str {
        match self {
            Asset::Vvv => "VVV",
            Asset::Diem => "DIEM",
        }
    }
}

impl std::fmt::Display for Asset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl std::str::FromStr for Asset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "VVV" => Ok(Asset::Vvv),
            "DIEM" => Ok(Asset::Diem),
            other => Err(format!("unknown asset: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Prices
// ---------------------------------------------------------------------------

/// One price reported by one quote source. Only constructed for usable
/// (finite, strictly positive) prices.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricePoint {
    pub asset: Asset,
    pub price: f64,
    pub source: String,
    pub volume_24h: Option<f64>,
    /// Nanosecond UTC epoch timestamp.
    pub fetched_at_ns: u64,
}

/// Median of the usable source prices for one asset in one cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedPrice {
    pub asset: Asset,
    pub value: f64,
    pub source_count: usize,
    /// Median of the 24h volumes the contributing sources reported, if any did.
    pub volume_24h: Option<f64>,
}

/// Mint rate in sVVV per DIEM, either fetched live or estimated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MintRateSample {
    pub rate: f64,
    pub estimated: bool,
    pub recorded_at_ns: u64,
}

/// A price is usable when it is present, finite and strictly positive.
pub fn is_usable_price(price: f64) -> bool {
    price.is_finite() && price > 0.0
}

// ---------------------------------------------------------------------------
// Shared labels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Confidence {
    High,
    Medium,
    Low,
    Neutral,
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Confidence::High => "HIGH",
            Confidence::Medium => "MEDIUM",
            Confidence::Low => "LOW",
            Confidence::Neutral => "NEUTRAL",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Mint arbitrage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArbitrageRecommendation {
    /// Spread at or above the profit threshold: mint DIEM and sell it.
    MintAndSell,
    /// Minting costs more than the market pays: keep the VVV.
    Hold,
    /// Positive spread below the threshold.
    Monitor,
}

impl std::fmt::Display for ArbitrageRecommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ArbitrageRecommendation::MintAndSell => "MINT_AND_SELL",
            ArbitrageRecommendation::Hold => "HOLD",
            ArbitrageRecommendation::Monitor => "MONITOR",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArbitrageAnalysis {
    pub mint_cost: f64,
    pub market_price: f64,
    pub mint_rate: f64,
    pub spread_usd: f64,
    pub spread_percent: f64,
    pub is_profitable: bool,
    pub recommendation: ArbitrageRecommendation,
    pub confidence: Confidence,
    /// Profit per minted DIEM, floored at zero.
    pub estimated_profit_per_unit: f64,
}

/// Best buy/sell pair across quote sources for one asset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrossExchangeOpportunity {
    pub asset: Asset,
    pub buy_source: String,
    pub buy_price: f64,
    pub sell_source: String,
    pub sell_price: f64,
    pub spread_usd: f64,
    pub spread_percent: f64,
}

// ---------------------------------------------------------------------------
// Valuation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValuationSignal {
    StrongBuy,
    Buy,
    Hold,
    Avoid,
}

impl std::fmt::Display for ValuationSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ValuationSignal::StrongBuy => "STRONG_BUY",
            ValuationSignal::Buy => "BUY",
            ValuationSignal::Hold => "HOLD",
            ValuationSignal::Avoid => "AVOID",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValuationAnalysis {
    pub market_price: f64,
    /// Intrinsic value at the fixed 25% rate the verdict uses.
    pub dcf_value: f64,
    /// Intrinsic value at the aggressive comparison rate.
    pub dcf_value_aggressive: f64,
    /// Intrinsic value at DCF_DISCOUNT_RATE. Informational only.
    pub dcf_value_configured: f64,
    pub mint_cost: f64,
    pub payback_days: f64,
    pub price_to_dcf_ratio: f64,
    /// Zero when mint cost is not positive.
    pub price_to_mint_ratio: f64,
    pub is_undervalued: bool,
    pub buy_signal: ValuationSignal,
    pub rationale: String,
}

// ---------------------------------------------------------------------------
// Momentum
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalKind {
    RsiOversold,
    PriceDrop,
    Bounce,
    VolumeSpike,
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SignalKind::RsiOversold => "RSI_OVERSOLD",
            SignalKind::PriceDrop => "PRICE_DROP",
            SignalKind::Bounce => "BOUNCE",
            SignalKind::VolumeSpike => "VOLUME_SPIKE",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    High,
    Medium,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MomentumSignal {
    pub kind: SignalKind,
    pub severity: Severity,
    pub value: f64,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalRecommendation {
    StrongBuy,
    Buy,
    Consider,
    Hold,
}

impl SignalRecommendation {
    /// Only BUY and STRONG_BUY are worth an alert.
    pub fn is_actionable(&self) -> bool {
        matches!(self, SignalRecommendation::StrongBuy | SignalRecommendation::Buy)
    }
}

impl std::fmt::Display for SignalRecommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SignalRecommendation::StrongBuy => "STRONG_BUY",
            SignalRecommendation::Buy => "BUY",
            SignalRecommendation::Consider => "CONSIDER",
            SignalRecommendation::Hold => "HOLD",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceAction {
    pub current_price: f64,
    pub recent_high: f64,
    pub recent_low: f64,
    pub drop_from_high_percent: f64,
    pub rise_from_low_percent: f64,
    pub signals: Vec<MomentumSignal>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalAnalysis {
    pub current_price: f64,
    pub rsi: Option<f64>,
    pub signals: Vec<MomentumSignal>,
    pub score: u32,
    pub recommendation: SignalRecommendation,
    pub confidence: Confidence,
    pub price_action: PriceAction,
}

/// Result of a momentum run. Too little history short-circuits before any
/// signal is computed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalOutcome {
    InsufficientData { available: usize, required: usize },
    Ready(SignalAnalysis),
}

pub fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}
