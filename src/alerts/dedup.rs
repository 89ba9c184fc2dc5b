//! Alert de-duplication across polling cycles.
//!
//! Mint-arbitrage and momentum alerts fire only when their recommendation
//! label changes. Valuation and cross-exchange alerts fire every qualifying
//! cycle. The state only advances through `acknowledge`, which the monitor
//! calls after a notification was delivered.

use crate::alerts::messages::{
    arbitrage_alert, cross_exchange_alert, momentum_alert, valuation_alert, AlertKind, Notification,
};
use crate::types::{
    ArbitrageAnalysis, ArbitrageRecommendation, CrossExchangeOpportunity, SignalAnalysis,
    SignalRecommendation, ValuationAnalysis, ValuationSignal,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertDedupState {
    pub last_arbitrage: Option<ArbitrageRecommendation>,
    pub last_momentum: Option<SignalRecommendation>,
}

/// Label to record once the matching alert has been delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupMark {
    Arbitrage(ArbitrageRecommendation),
    Momentum(SignalRecommendation),
}

#[derive(Debug, Clone)]
pub struct PlannedAlert {
    pub kind: AlertKind,
    pub notification: Notification,
    pub mark: Option<DedupMark>,
}

/// Everything one cycle produced that may turn into an alert.
#[derive(Debug, Default)]
pub struct CycleSignals<'a> {
    /// Mint arbitrage analysis and whether it crossed the alert rule.
    pub arbitrage: Option<(&'a ArbitrageAnalysis, bool)>,
    pub valuation: Option<&'a ValuationAnalysis>,
    pub momentum: Option<&'a SignalAnalysis>,
    pub cross_exchange: Vec<&'a CrossExchangeOpportunity>,
}

impl AlertDedupState {
    /// Alerts to emit for this cycle given the current state. Pure.
    pub fn plan(&self, signals: &CycleSignals<'_>) -> Vec<PlannedAlert> {
        let mut alerts = Vec::new();

        if let Some((analysis, should_alert)) = signals.arbitrage {
            if should_alert && self.last_arbitrage != Some(analysis.recommendation) {
                alerts.push(PlannedAlert {
                    kind: AlertKind::MintArbitrage,
                    notification: arbitrage_alert(analysis),
                    mark: Some(DedupMark::Arbitrage(analysis.recommendation)),
                });
            }
        }

        if let Some(valuation) = signals.valuation {
            if matches!(valuation.buy_signal, ValuationSignal::StrongBuy | ValuationSignal::Buy) {
                alerts.push(PlannedAlert {
                    kind: AlertKind::Valuation,
                    notification: valuation_alert(valuation),
                    mark: None,
                });
            }
        }

        if let Some(momentum) = signals.momentum {
            if momentum.recommendation.is_actionable()
                && self.last_momentum != Some(momentum.recommendation)
            {
                alerts.push(PlannedAlert {
                    kind: AlertKind::Momentum,
                    notification: momentum_alert(momentum),
                    mark: Some(DedupMark::Momentum(momentum.recommendation)),
                });
            }
        }

        for opportunity in &signals.cross_exchange {
            alerts.push(PlannedAlert {
                kind: AlertKind::CrossExchange,
                notification: cross_exchange_alert(opportunity),
                mark: None,
            });
        }

        alerts
    }

    /// State after a delivered alert. Pure.
    pub fn acknowledge(self, mark: DedupMark) -> Self {
        match mark {
            DedupMark::Arbitrage(rec) => Self {
                last_arbitrage: Some(rec),
                ..self
            },
            DedupMark::Momentum(rec) => Self {
                last_momentum: Some(rec),
                ..self
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{IntrinsicValueCalculator, SignalAnalyzer, SpreadAnalyzer};
    use crate::types::{Asset, SignalOutcome};

    /// Runs plan + acknowledge as if every delivery succeeded.
    fn cycle(state: AlertDedupState, signals: &CycleSignals<'_>) -> (AlertDedupState, Vec<AlertKind>) {
        let planned = state.plan(signals);
        let kinds = planned.iter().map(|p| p.kind).collect();
        let next = planned
            .iter()
            .filter_map(|p| p.mark)
            .fold(state, AlertDedupState::acknowledge);
        (next, kinds)
    }

    fn strong_momentum() -> SignalAnalysis {
        let history: Vec<f64> = (0..20).map(|i| 1.0 + i as f64 * 0.05).collect();
        match SignalAnalyzer::default().generate_buy_signal(1.0, &history, None, None) {
            SignalOutcome::Ready(a) => a,
            SignalOutcome::InsufficientData { .. } => unreachable!(),
        }
    }

    #[test]
    fn identical_arbitrage_label_alerts_once() {
        let analyzer = SpreadAnalyzer::new(5.0);
        let a = analyzer.analyze_mint_arbitrage(237.9, 250.0, 237.9);
        let signals = CycleSignals {
            arbitrage: Some((&a, analyzer.should_alert(&a))),
            ..Default::default()
        };

        let (state, first) = cycle(AlertDedupState::default(), &signals);
        assert_eq!(first, vec![AlertKind::MintArbitrage]);
        assert_eq!(state.last_arbitrage, Some(ArbitrageRecommendation::MintAndSell));

        let (_, second) = cycle(state, &signals);
        assert!(second.is_empty());
    }

    #[test]
    fn changed_arbitrage_label_alerts_again() {
        let analyzer = SpreadAnalyzer::new(5.0);
        let profitable = analyzer.analyze_mint_arbitrage(100.0, 120.0, 100.0);
        let anomaly = analyzer.analyze_mint_arbitrage(1000.0, 100.0, 1000.0);

        let (state, _) = cycle(
            AlertDedupState::default(),
            &CycleSignals {
                arbitrage: Some((&profitable, true)),
                ..Default::default()
            },
        );
        let (state, kinds) = cycle(
            state,
            &CycleSignals {
                arbitrage: Some((&anomaly, analyzer.should_alert(&anomaly))),
                ..Default::default()
            },
        );
        assert_eq!(kinds, vec![AlertKind::MintArbitrage]);
        assert_eq!(state.last_arbitrage, Some(ArbitrageRecommendation::Hold));
    }

    #[test]
    fn non_alerting_arbitrage_leaves_state_alone() {
        let analyzer = SpreadAnalyzer::new(5.0);
        let monitor = analyzer.analyze_mint_arbitrage(100.0, 102.0, 100.0);
        let (state, kinds) = cycle(
            AlertDedupState::default(),
            &CycleSignals {
                arbitrage: Some((&monitor, analyzer.should_alert(&monitor))),
                ..Default::default()
            },
        );
        assert!(kinds.is_empty());
        assert_eq!(state, AlertDedupState::default());
    }

    #[test]
    fn undelivered_alert_is_planned_again() {
        let analyzer = SpreadAnalyzer::new(5.0);
        let a = analyzer.analyze_mint_arbitrage(100.0, 120.0, 100.0);
        let signals = CycleSignals {
            arbitrage: Some((&a, true)),
            ..Default::default()
        };
        let state = AlertDedupState::default();
        assert_eq!(state.plan(&signals).len(), 1);
        // No acknowledge: the next cycle still wants to send it.
        assert_eq!(state.plan(&signals).len(), 1);
    }

    #[test]
    fn valuation_and_cross_exchange_are_never_deduplicated() {
        let valuation = IntrinsicValueCalculator::new(0.25).analyze_valuation(250.0, 200.0);
        let opportunity = CrossExchangeOpportunity {
            asset: Asset::Diem,
            buy_source: "a".to_string(),
            buy_price: 100.0,
            sell_source: "b".to_string(),
            sell_price: 110.0,
            spread_usd: 10.0,
            spread_percent: 10.0,
        };
        let signals = CycleSignals {
            valuation: Some(&valuation),
            cross_exchange: vec![&opportunity],
            ..Default::default()
        };

        let (state, first) = cycle(AlertDedupState::default(), &signals);
        let (_, second) = cycle(state, &signals);
        assert_eq!(first, vec![AlertKind::Valuation, AlertKind::CrossExchange]);
        assert_eq!(second, first);
    }

    #[test]
    fn avoid_valuation_is_silent() {
        let valuation = IntrinsicValueCalculator::new(0.25).analyze_valuation(1500.0, 200.0);
        let signals = CycleSignals {
            valuation: Some(&valuation),
            ..Default::default()
        };
        assert!(AlertDedupState::default().plan(&signals).is_empty());
    }

    #[test]
    fn momentum_alerts_on_buy_labels_once() {
        let momentum = strong_momentum();
        let signals = CycleSignals {
            momentum: Some(&momentum),
            ..Default::default()
        };
        let (state, first) = cycle(AlertDedupState::default(), &signals);
        assert_eq!(first, vec![AlertKind::Momentum]);
        assert_eq!(state.last_momentum, Some(SignalRecommendation::StrongBuy));
        let (_, second) = cycle(state, &signals);
        assert!(second.is_empty());
    }
}
