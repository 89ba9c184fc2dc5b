use tracing::{debug, warn};

use crate::types::{
    Confidence, MomentumSignal, PriceAction, Severity, SignalAnalysis, SignalKind, SignalOutcome,
    SignalRecommendation,
};

/// RSI below this is deeply oversold: HIGH severity, 3 points.
const DEEP_OVERSOLD_RSI: f64 = 20.0;
/// Drops beyond this are HIGH severity (percent).
const HIGH_DROP_PERCENT: f64 = 20.0;
/// A bounce needs at least this rise off the low (percent)...
const BOUNCE_RISE_PERCENT: f64 = 5.0;
/// ...while still sitting this far under the high (percent).
const BOUNCE_DROP_PERCENT: f64 = 10.0;

/// Buy-signal scoring for VVV from its recent price history.
#[derive(Debug, Clone)]
pub struct SignalAnalyzer {
    pub rsi_oversold: f64,
    pub rsi_period: usize,
    pub price_drop_threshold: f64,
    pub lookback: usize,
    pub volume_spike_multiplier: f64,
}

impl Default for SignalAnalyzer {
    fn default() -> Self {
        Self {
            rsi_oversold: 30.0,
            rsi_period: 14,
            price_drop_threshold: 15.0,
            lookback: 7,
            volume_spike_multiplier: 2.0,
        }
    }
}

impl SignalAnalyzer {
    /// `history` is most-recent-first and should start with `current_price`.
    pub fn generate_buy_signal(
        &self,
        current_price: f64,
        history: &[f64],
        volume_current: Option<f64>,
        volume_avg: Option<f64>,
    ) -> SignalOutcome {
        let Some(price_action) = self.analyze_price_action(current_price, history) else {
            debug!(
                available = history.len(),
                required = self.lookback,
                "insufficient history for price action"
            );
            return SignalOutcome::InsufficientData {
                available: history.len(),
                required: self.lookback,
            };
        };

        let mut signals = Vec::new();
        let mut score = 0u32;

        let oldest_first: Vec<f64> = history.iter().rev().copied().collect();
        let rsi = calculate_rsi(&oldest_first, self.rsi_period);
        if let Some(rsi) = rsi {
            if rsi < self.rsi_oversold {
                let deep = rsi < DEEP_OVERSOLD_RSI;
                signals.push(MomentumSignal {
                    kind: SignalKind::RsiOversold,
                    severity: if deep { Severity::High } else { Severity::Medium },
                    value: rsi,
                    message: format!("RSI oversold at {rsi:.1}"),
                });
                score += if deep { 3 } else { 2 };
            }
        }

        for signal in &price_action.signals {
            score += match (signal.kind, signal.severity) {
                (SignalKind::PriceDrop, Severity::High) => 3,
                (SignalKind::PriceDrop, Severity::Medium) => 2,
                (SignalKind::Bounce, _) => 1,
                _ => 0,
            };
        }
        signals.extend(price_action.signals.iter().cloned());

        if let (Some(current), Some(avg)) = (volume_current, volume_avg) {
            if avg > 0.0 {
                let ratio = current / avg;
                if ratio >= self.volume_spike_multiplier {
                    signals.push(MomentumSignal {
                        kind: SignalKind::VolumeSpike,
                        severity: Severity::Medium,
                        value: ratio,
                        message: format!("Volume spike: {ratio:.1}x average"),
                    });
                    score += 2;
                }
            }
        }

        let (recommendation, confidence) = recommend(score);

        if score >= 3 {
            let rsi_label = rsi.map_or_else(|| "n/a".to_string(), |r| format!("{r:.1}"));
            warn!(
                score,
                "VVV BUY SIGNAL: {recommendation} (score {score}, {} signals, price ${current_price:.4}, RSI {rsi_label})",
                signals.len(),
            );
        }

        SignalOutcome::Ready(SignalAnalysis {
            current_price,
            rsi,
            signals,
            score,
            recommendation,
            confidence,
            price_action,
        })
    }

    /// Drop from the recent high and rise from the recent low over the first
    /// `lookback` samples of a most-recent-first history.
    pub fn analyze_price_action(&self, current_price: f64, history: &[f64]) -> Option<PriceAction> {
        if history.is_empty() || history.len() < self.lookback {
            return None;
        }
        let window = &history[..self.lookback.max(1)];
        let recent_high = window.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let recent_low = window.iter().copied().fold(f64::INFINITY, f64::min);
        if recent_high <= 0.0 || recent_low <= 0.0 {
            return None;
        }

        let drop_from_high_percent = (recent_high - current_price) / recent_high * 100.0;
        let rise_from_low_percent = (current_price - recent_low) / recent_low * 100.0;

        let mut signals = Vec::new();
        if drop_from_high_percent >= self.price_drop_threshold {
            signals.push(MomentumSignal {
                kind: SignalKind::PriceDrop,
                severity: if drop_from_high_percent > HIGH_DROP_PERCENT {
                    Severity::High
                } else {
                    Severity::Medium
                },
                value: drop_from_high_percent,
                message: format!(
                    "Price dropped {drop_from_high_percent:.1}% from {}-sample high",
                    self.lookback
                ),
            });
        }
        if rise_from_low_percent > BOUNCE_RISE_PERCENT && drop_from_high_percent > BOUNCE_DROP_PERCENT {
            signals.push(MomentumSignal {
                kind: SignalKind::Bounce,
                severity: Severity::Medium,
                value: rise_from_low_percent,
                message: format!("Potential bounce: {rise_from_low_percent:.1}% from recent low"),
            });
        }

        Some(PriceAction {
            current_price,
            recent_high,
            recent_low,
            drop_from_high_percent,
            rise_from_low_percent,
            signals,
        })
    }
}

/// RSI over the last `period` deltas of an oldest-first series.
/// None when fewer than `period + 1` samples exist.
pub fn calculate_rsi(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period + 1 {
        return None;
    }
    let window = &prices[prices.len() - (period + 1)..];
    let (gains, losses) = window
        .windows(2)
        .map(|pair| pair[1] - pair[0])
        .fold((0.0, 0.0), |(g, l), delta| {
            if delta > 0.0 {
                (g + delta, l)
            } else {
                (g, l - delta)
            }
        });

    let avg_gain = gains / period as f64;
    let avg_loss = losses / period as f64;

    let rsi = if avg_loss == 0.0 {
        // Flat series carries no momentum either way.
        if avg_gain == 0.0 {
            50.0
        } else {
            100.0
        }
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    };
    Some(rsi)
}

fn recommend(score: u32) -> (SignalRecommendation, Confidence) {
    match score {
        s if s >= 5 => (SignalRecommendation::StrongBuy, Confidence::High),
        s if s >= 3 => (SignalRecommendation::Buy, Confidence::Medium),
        s if s >= 1 => (SignalRecommendation::Consider, Confidence::Low),
        _ => (SignalRecommendation::Hold, Confidence::Neutral),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready(outcome: SignalOutcome) -> SignalAnalysis {
        match outcome {
            SignalOutcome::Ready(a) => a,
            SignalOutcome::InsufficientData { .. } => panic!("expected a ready analysis"),
        }
    }

    fn kinds(a: &SignalAnalysis) -> Vec<SignalKind> {
        a.signals.iter().map(|s| s.kind).collect()
    }

    #[test]
    fn rsi_needs_period_plus_one_samples() {
        let prices: Vec<f64> = (1..=14).map(|i| i as f64).collect();
        assert_eq!(calculate_rsi(&prices, 14), None);
        let prices: Vec<f64> = (1..=15).map(|i| i as f64).collect();
        assert!(calculate_rsi(&prices, 14).is_some());
    }

    #[test]
    fn rsi_of_rising_series_is_100() {
        let prices: Vec<f64> = (1..=30).map(|i| i as f64).collect();
        assert_eq!(calculate_rsi(&prices, 14), Some(100.0));
    }

    #[test]
    fn rsi_of_falling_series_is_0() {
        let prices: Vec<f64> = (1..=30).rev().map(|i| i as f64).collect();
        assert_eq!(calculate_rsi(&prices, 14), Some(0.0));
    }

    #[test]
    fn rsi_of_flat_series_is_neutral() {
        assert_eq!(calculate_rsi(&[2.0; 20], 14), Some(50.0));
    }

    #[test]
    fn rsi_balances_gains_and_losses() {
        // +2, -1 alternating over 4 deltas: gains 4, losses 2
        let rsi = calculate_rsi(&[10.0, 12.0, 11.0, 13.0, 12.0], 4).unwrap();
        assert!((rsi - (100.0 - 100.0 / 3.0)).abs() < 1e-9);
    }

    #[test]
    fn rsi_uses_only_the_latest_window() {
        // An old crash outside the window must not matter.
        let mut prices = vec![100.0, 1.0];
        prices.extend((1..=15).map(|i| i as f64));
        assert_eq!(calculate_rsi(&prices, 14), Some(100.0));
    }

    #[test]
    fn short_history_is_insufficient_data() {
        let analyzer = SignalAnalyzer::default();
        let outcome = analyzer.generate_buy_signal(1.0, &[1.0, 1.1, 1.2], None, None);
        assert_eq!(
            outcome,
            SignalOutcome::InsufficientData { available: 3, required: 7 }
        );
    }

    #[test]
    fn steady_price_is_hold() {
        let analyzer = SignalAnalyzer::default();
        let a = ready(analyzer.generate_buy_signal(1.0, &[1.0; 20], None, None));
        assert!(a.signals.is_empty());
        assert_eq!(a.score, 0);
        assert_eq!(a.recommendation, SignalRecommendation::Hold);
        assert_eq!(a.confidence, Confidence::Neutral);
    }

    #[test]
    fn medium_drop_scores_two() {
        let analyzer = SignalAnalyzer::default();
        // 17.6% under the 7-sample high of 1.0; RSI unavailable (7 samples).
        let history = [0.824, 0.9, 0.95, 1.0, 1.0, 0.98, 0.97];
        let a = ready(analyzer.generate_buy_signal(0.824, &history, None, None));
        assert_eq!(a.rsi, None);
        assert_eq!(kinds(&a), vec![SignalKind::PriceDrop]);
        assert_eq!(a.signals[0].severity, Severity::Medium);
        assert_eq!(a.score, 2);
        assert_eq!(a.recommendation, SignalRecommendation::Consider);
    }

    #[test]
    fn crash_with_oversold_rsi_is_strong_buy() {
        let analyzer = SignalAnalyzer::default();
        // Most recent first: steady slide from 2.0 to 1.0.
        let history: Vec<f64> = (0..20).map(|i| 1.0 + i as f64 * 0.05).collect();
        let a = ready(analyzer.generate_buy_signal(1.0, &history, None, None));
        assert_eq!(a.rsi, Some(0.0));
        assert_eq!(kinds(&a), vec![SignalKind::RsiOversold, SignalKind::PriceDrop]);
        assert_eq!(a.signals[0].severity, Severity::High);
        assert_eq!(a.signals[1].severity, Severity::High);
        assert_eq!(a.score, 6);
        assert_eq!(a.recommendation, SignalRecommendation::StrongBuy);
        assert_eq!(a.confidence, Confidence::High);
    }

    #[test]
    fn bounce_off_a_dip() {
        let analyzer = SignalAnalyzer::default();
        // High 1.0, low 0.8, now 0.88: 12% under high, 10% over low.
        let history = [0.88, 0.8, 0.85, 0.9, 0.95, 1.0, 0.99];
        let a = ready(analyzer.generate_buy_signal(0.88, &history, None, None));
        assert_eq!(kinds(&a), vec![SignalKind::Bounce]);
        assert_eq!(a.score, 1);
        assert_eq!(a.recommendation, SignalRecommendation::Consider);
    }

    #[test]
    fn volume_spike_adds_two() {
        let analyzer = SignalAnalyzer::default();
        let a = ready(analyzer.generate_buy_signal(1.0, &[1.0; 10], Some(500.0), Some(200.0)));
        assert_eq!(kinds(&a), vec![SignalKind::VolumeSpike]);
        assert_eq!(a.signals[0].value, 2.5);
        assert_eq!(a.score, 2);

        let quiet = ready(analyzer.generate_buy_signal(1.0, &[1.0; 10], Some(300.0), Some(200.0)));
        assert!(quiet.signals.is_empty());

        let missing = ready(analyzer.generate_buy_signal(1.0, &[1.0; 10], Some(500.0), None));
        assert!(missing.signals.is_empty());
    }

    #[test]
    fn moderately_oversold_rsi_scores_two() {
        let analyzer = SignalAnalyzer {
            lookback: 2,
            ..SignalAnalyzer::default()
        };
        // Oldest first: 14 deltas, 4 gains of 1 and 10 losses of 1 -> RSI 28.6
        let mut oldest_first = vec![100.0];
        for i in 0..14 {
            let last = *oldest_first.last().unwrap();
            oldest_first.push(if i < 4 { last + 1.0 } else { last - 1.0 });
        }
        let history: Vec<f64> = oldest_first.iter().rev().copied().collect();
        let a = ready(analyzer.generate_buy_signal(history[0], &history, None, None));
        let rsi = a.rsi.unwrap();
        assert!((rsi - 100.0 * 4.0 / 14.0).abs() < 1e-9);
        assert_eq!(a.signals[0].kind, SignalKind::RsiOversold);
        assert_eq!(a.signals[0].severity, Severity::Medium);
        assert_eq!(a.score, 2);
    }

    #[test]
    fn score_thresholds() {
        assert_eq!(recommend(5).0, SignalRecommendation::StrongBuy);
        assert_eq!(recommend(4).0, SignalRecommendation::Buy);
        assert_eq!(recommend(3).1, Confidence::Medium);
        assert_eq!(recommend(1).0, SignalRecommendation::Consider);
        assert_eq!(recommend(0).0, SignalRecommendation::Hold);
    }
}
