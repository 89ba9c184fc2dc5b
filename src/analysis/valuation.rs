use tracing::{debug, warn};

use crate::types::{ValuationAnalysis, ValuationSignal};

/// DIEM redeems for $1 of API credit per day.
pub const DAILY_CREDIT_USD: f64 = 1.0;
pub const ANNUAL_CREDIT_USD: f64 = 365.0;

/// Substituted for any non-positive discount rate.
pub const DEFAULT_DISCOUNT_RATE: f64 = 0.25;
/// Rate the buy/hold/avoid verdict is always judged at.
pub const CONSERVATIVE_DISCOUNT_RATE: f64 = 0.25;
/// Comparison rate reported next to the verdict rate.
pub const AGGRESSIVE_DISCOUNT_RATE: f64 = 0.50;

/// Price/intrinsic ratio below which an undervalued DIEM is a STRONG_BUY.
const STRONG_BUY_RATIO: f64 = 0.85;
/// Payback periods shorter than this are a HOLD rather than AVOID.
const HOLD_PAYBACK_DAYS: f64 = 300.0;

/// Values DIEM as a perpetuity of its daily credit.
pub struct IntrinsicValueCalculator {
    discount_rate: f64,
}

impl IntrinsicValueCalculator {
    pub fn new(discount_rate: f64) -> Self {
        Self { discount_rate }
    }

    /// Present value of `ANNUAL_CREDIT_USD` forever at `rate`.
    pub fn calculate_dcf_value(rate: f64) -> f64 {
        let rate = if rate > 0.0 {
            rate
        } else {
            warn!(rate, "invalid discount rate, using {DEFAULT_DISCOUNT_RATE}");
            DEFAULT_DISCOUNT_RATE
        };
        let value = ANNUAL_CREDIT_USD / rate;
        debug!("DCF value ${value:.2} at {:.0}% discount", rate * 100.0);
        value
    }

    /// Intrinsic value at the configured rate.
    pub fn dcf_value(&self) -> f64 {
        Self::calculate_dcf_value(self.discount_rate)
    }

    pub fn calculate_payback_days(market_price: f64) -> f64 {
        market_price / DAILY_CREDIT_USD
    }

    pub fn analyze_valuation(&self, market_price: f64, mint_cost: f64) -> ValuationAnalysis {
        let dcf_value = Self::calculate_dcf_value(CONSERVATIVE_DISCOUNT_RATE);
        let dcf_value_configured = self.dcf_value();
        let dcf_value_aggressive = Self::calculate_dcf_value(AGGRESSIVE_DISCOUNT_RATE);
        let payback_days = Self::calculate_payback_days(market_price);

        let price_to_dcf_ratio = market_price / dcf_value;
        let price_to_mint_ratio = if mint_cost > 0.0 {
            market_price / mint_cost
        } else {
            0.0
        };
        let is_undervalued = market_price < dcf_value;

        let (buy_signal, rationale) = if is_undervalued && price_to_dcf_ratio < STRONG_BUY_RATIO {
            (
                ValuationSignal::StrongBuy,
                format!(
                    "Trading {:.1}% below intrinsic value",
                    (1.0 - price_to_dcf_ratio) * 100.0
                ),
            )
        } else if is_undervalued {
            (ValuationSignal::Buy, "Trading below intrinsic value".to_string())
        } else if payback_days < HOLD_PAYBACK_DAYS {
            (
                ValuationSignal::Hold,
                format!("Reasonable {payback_days:.0}-day payback if using API credits"),
            )
        } else {
            (
                ValuationSignal::Avoid,
                format!("Overvalued with {payback_days:.0}-day payback"),
            )
        };

        if is_undervalued {
            warn!(
                "DIEM UNDERVALUED: ${market_price:.2} vs ${dcf_value:.2} intrinsic ({:.1}% discount)",
                (1.0 - price_to_dcf_ratio) * 100.0
            );
        }

        ValuationAnalysis {
            market_price,
            dcf_value,
            dcf_value_aggressive,
            dcf_value_configured,
            mint_cost,
            payback_days,
            price_to_dcf_ratio,
            price_to_mint_ratio,
            is_undervalued,
            buy_signal,
            rationale,
        }
    }
}
