use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::alerts::{AlertDedupState, CycleSignals, Notifier};
use crate::analysis::spread::detect_cross_exchange;
use crate::analysis::{IntrinsicValueCalculator, SignalAnalyzer, SpreadAnalyzer};
use crate::api::health::HealthState;
use crate::config::Config;
use crate::db::PriceHistory;
use crate::error::{AppError, Result};
use crate::pricing::mint::mint_cost;
use crate::pricing::{MintCalculator, PriceAggregator, SourceSnapshot};
use crate::types::{
    now_ns, AggregatedPrice, ArbitrageAnalysis, Asset, CrossExchangeOpportunity, MintRateSample,
    SignalOutcome, ValuationAnalysis,
};

/// Whether a cycle talks to the outside world or only reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    /// Send alerts and persist prices.
    Live,
    /// Analyze only: nothing is sent and nothing is written.
    DryRun,
}

/// Everything one cycle saw and decided.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub started_at_ns: u64,
    pub vvv: AggregatedPrice,
    pub diem: AggregatedPrice,
    /// Per-source prices by asset; `None` marks a failed source.
    pub source_prices: BTreeMap<Asset, BTreeMap<String, Option<f64>>>,
    pub mint: MintRateSample,
    pub mint_cost: f64,
    pub arbitrage: ArbitrageAnalysis,
    pub valuation: ValuationAnalysis,
    pub momentum: SignalOutcome,
    pub cross_exchange: Vec<CrossExchangeOpportunity>,
    /// Titles of the alerts this cycle decided to emit.
    pub planned_alerts: Vec<String>,
    /// Titles actually delivered (always empty for a dry run).
    pub sent_alerts: Vec<String>,
}

/// The polling loop. Owns the de-duplication state; one cycle at a time.
pub struct Monitor {
    aggregator: PriceAggregator,
    mint: MintCalculator,
    spread: SpreadAnalyzer,
    valuation: IntrinsicValueCalculator,
    signals: SignalAnalyzer,
    notifier: Box<dyn Notifier>,
    history: PriceHistory,
    health: Arc<HealthState>,
    dedup: AlertDedupState,
    check_interval: Duration,
    history_days: u32,
    cross_exchange_min_spread_percent: f64,
}

impl Monitor {
    pub fn new(
        cfg: &Config,
        aggregator: PriceAggregator,
        mint: MintCalculator,
        notifier: Box<dyn Notifier>,
        history: PriceHistory,
        health: Arc<HealthState>,
    ) -> Self {
        Self {
            aggregator,
            mint,
            spread: SpreadAnalyzer::new(cfg.min_profit_percent),
            valuation: IntrinsicValueCalculator::new(cfg.dcf_discount_rate),
            signals: SignalAnalyzer {
                rsi_oversold: cfg.rsi_oversold,
                rsi_period: cfg.rsi_period,
                price_drop_threshold: cfg.price_drop_percent,
                lookback: cfg.price_action_lookback,
                volume_spike_multiplier: cfg.volume_spike_multiplier,
            },
            notifier,
            history,
            health,
            dedup: AlertDedupState::default(),
            check_interval: Duration::from_secs(cfg.check_interval_secs),
            history_days: cfg.history_days,
            cross_exchange_min_spread_percent: cfg.cross_exchange_min_spread_percent,
        }
    }

    /// Runs cycles forever. A failed cycle is logged and the loop waits for the next tick.
    pub async fn run(mut self) {
        info!(
            interval_secs = self.check_interval.as_secs(),
            sources = ?self.aggregator.source_names(),
            "Monitor started"
        );
        let mut ticker = interval(self.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match self.run_cycle().await {
                Ok(report) => info!(
                    vvv = report.vvv.value,
                    diem = report.diem.value,
                    spread_percent = report.arbitrage.spread_percent,
                    alerts = report.sent_alerts.len(),
                    "Cycle complete: VVV ${:.4} | DIEM ${:.2} | spread {:+.2}% | {}",
                    report.vvv.value,
                    report.diem.value,
                    report.arbitrage.spread_percent,
                    report.valuation.buy_signal,
                ),
                Err(e) => error!("Cycle failed: {e}"),
            }
            debug!("next check in {}s", self.check_interval.as_secs());
        }
    }

    /// One full cycle: fetch, analyze, alert, persist.
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        let result = self.cycle(Delivery::Live).await;
        self.health.record_cycle(result.is_ok(), now_ns());
        result
    }

    /// Same analysis as `run_cycle`, without sending alerts or writing to the store.
    pub async fn check_once(&mut self) -> Result<CycleReport> {
        self.cycle(Delivery::DryRun).await
    }

    async fn cycle(&mut self, delivery: Delivery) -> Result<CycleReport> {
        let started_at_ns = now_ns();

        let vvv_snapshot = self.aggregator.fetch_snapshot(Asset::Vvv).await;
        let diem_snapshot = self.aggregator.fetch_snapshot(Asset::Diem).await;
        let vvv = vvv_snapshot
            .aggregate()
            .ok_or(AppError::PriceUnavailable(Asset::Vvv))?;
        let diem = diem_snapshot
            .aggregate()
            .ok_or(AppError::PriceUnavailable(Asset::Diem))?;

        let mint = self.mint.current_rate().await;
        let cost = mint_cost(mint.rate, vvv.value);
        debug!(mint_rate = mint.rate, estimated = mint.estimated, mint_cost = cost, "mint cost");

        let arbitrage = self.spread.analyze_mint_arbitrage(cost, diem.value, mint.rate);
        let arbitrage_alert = self.spread.should_alert(&arbitrage);
        let valuation = self.valuation.analyze_valuation(diem.value, cost);
        let momentum = self.momentum(&vvv).await;

        // DIEM only.
        let cross_exchange: Vec<CrossExchangeOpportunity> = detect_cross_exchange(
            Asset::Diem,
            &diem_snapshot.price_map(),
            self.cross_exchange_min_spread_percent,
        )
        .into_iter()
        .collect();

        let planned = self.dedup.plan(&CycleSignals {
            arbitrage: Some((&arbitrage, arbitrage_alert)),
            valuation: Some(&valuation),
            momentum: match &momentum {
                SignalOutcome::Ready(analysis) => Some(analysis),
                SignalOutcome::InsufficientData { .. } => None,
            },
            cross_exchange: cross_exchange.iter().collect(),
        });
        let planned_alerts = planned.iter().map(|p| p.notification.title.clone()).collect();

        let mut sent_alerts = Vec::new();
        if delivery == Delivery::Live {
            for alert in planned {
                match self.notifier.send(&alert.notification).await {
                    Ok(()) => {
                        if let Some(mark) = alert.mark {
                            self.dedup = std::mem::take(&mut self.dedup).acknowledge(mark);
                        }
                        if let Err(e) = self.history.save_alert(alert.kind, &alert.notification).await {
                            error!(kind = %alert.kind, "failed to record alert: {e}");
                        }
                        sent_alerts.push(alert.notification.title);
                    }
                    Err(e) => error!(
                        kind = %alert.kind,
                        title = %alert.notification.title,
                        "notification failed: {e}"
                    ),
                }
            }

            self.persist(&[&vvv_snapshot, &diem_snapshot], &[&vvv, &diem], &mint, started_at_ns)
                .await;
        }

        let source_prices = [&vvv_snapshot, &diem_snapshot]
            .into_iter()
            .map(|s| (s.asset, s.price_map()))
            .collect();

        Ok(CycleReport {
            started_at_ns,
            vvv,
            diem,
            source_prices,
            mint,
            mint_cost: cost,
            arbitrage,
            valuation,
            momentum,
            cross_exchange,
            planned_alerts,
            sent_alerts,
        })
    }

    /// Momentum over stored VVV history with the current price in front.
    async fn momentum(&self, vvv: &AggregatedPrice) -> SignalOutcome {
        let stored = match self.history.get_history(Asset::Vvv, self.history_days).await {
            Ok(rows) => rows,
            Err(e) => {
                warn!("could not load VVV history: {e}");
                Vec::new()
            }
        };

        let prices: Vec<f64> = std::iter::once(vvv.value)
            .chain(stored.iter().map(|h| h.price))
            .collect();
        let required = self.signals.rsi_period + 1;
        if prices.len() < required {
            info!(
                available = prices.len(),
                required,
                "not enough VVV history for momentum analysis yet"
            );
            return SignalOutcome::InsufficientData {
                available: prices.len(),
                required,
            };
        }

        let volumes: Vec<f64> = stored.iter().filter_map(|h| h.volume_24h).collect();
        let volume_avg = (!volumes.is_empty()).then(|| volumes.iter().sum::<f64>() / volumes.len() as f64);

        self.signals
            .generate_buy_signal(vvv.value, &prices, vvv.volume_24h, volume_avg)
    }

    async fn persist(
        &self,
        snapshots: &[&SourceSnapshot],
        prices: &[&AggregatedPrice],
        mint: &MintRateSample,
        recorded_at_ns: u64,
    ) {
        for point in snapshots.iter().flat_map(|s| s.points()) {
            if let Err(e) = self.history.save_price(point).await {
                error!(asset = %point.asset, source = %point.source, "failed to save price: {e}");
            }
        }
        for price in prices {
            if let Err(e) = self.history.save_aggregated(price, recorded_at_ns).await {
                error!(asset = %price.asset, "failed to save aggregated price: {e}");
            }
        }
        if let Err(e) = self.history.save_mint_rate(mint).await {
            error!("failed to save mint rate: {e}");
        }
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Current prices")?;
        writeln!(f, "  VVV:        ${:.4} ({} sources)", self.vvv.value, self.vvv.source_count)?;
        writeln!(f, "  DIEM:       ${:.2} ({} sources)", self.diem.value, self.diem.source_count)?;
        writeln!(
            f,
            "  Mint rate:  {:.2} sVVV per DIEM{}",
            self.mint.rate,
            if self.mint.estimated { " (estimated)" } else { "" }
        )?;
        writeln!(f, "  Mint cost:  ${:.2}", self.mint_cost)?;

        let a = &self.arbitrage;
        writeln!(f, "\nArbitrage")?;
        writeln!(
            f,
            "  Spread:     {:+.2}% ({:+.2} USD per DIEM)",
            a.spread_percent, a.spread_usd
        )?;
        writeln!(f, "  Verdict:    {} ({})", a.recommendation, a.confidence)?;

        let v = &self.valuation;
        writeln!(f, "\nValuation")?;
        writeln!(
            f,
            "  DCF value:  ${:.2} (aggressive ${:.2}, configured ${:.2})",
            v.dcf_value, v.dcf_value_aggressive, v.dcf_value_configured
        )?;
        writeln!(f, "  Price/DCF:  {:.2}", v.price_to_dcf_ratio)?;
        writeln!(f, "  Payback:    {:.0} days", v.payback_days)?;
        writeln!(f, "  Signal:     {}", v.buy_signal)?;

        writeln!(f, "\nMomentum")?;
        match &self.momentum {
            SignalOutcome::Ready(m) => {
                let rsi = m.rsi.map_or_else(|| "n/a".to_string(), |r| format!("{r:.1}"));
                writeln!(f, "  RSI:        {rsi}")?;
                writeln!(f, "  Score:      {} -> {} ({})", m.score, m.recommendation, m.confidence)?;
                for s in &m.signals {
                    writeln!(f, "  - {}: {}", s.kind, s.message)?;
                }
            }
            SignalOutcome::InsufficientData { available, required } => {
                writeln!(f, "  insufficient history ({available}/{required} samples)")?;
            }
        }

        writeln!(f, "\nPrices by source")?;
        for (asset, prices) in &self.source_prices {
            for (source, price) in prices {
                match price {
                    Some(p) => writeln!(f, "  {asset} {source}: ${p:.4}")?,
                    None => writeln!(f, "  {asset} {source}: N/A")?,
                }
            }
        }
        for o in &self.cross_exchange {
            writeln!(
                f,
                "  {} cross-exchange: buy {} ${:.4}, sell {} ${:.4} ({:.2}%)",
                o.asset, o.buy_source, o.buy_price, o.sell_source, o.sell_price, o.spread_percent
            )?;
        }

        if !self.planned_alerts.is_empty() {
            writeln!(f, "\nAlerts")?;
            for title in &self.planned_alerts {
                writeln!(f, "  {title}")?;
            }
        }
        Ok(())
    }
}
