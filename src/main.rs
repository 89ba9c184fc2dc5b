mod alerts;
mod analysis;
mod api;
mod config;
mod db;
mod error;
mod monitor;
mod pricing;
mod sources;
mod types;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::alerts::{CaelumNotifier, LogNotifier, Notifier};
use crate::api::health::HealthState;
use crate::api::latency::SourceLatency;
use crate::api::routes::{router, ApiState};
use crate::config::Config;
use crate::db::PriceHistory;
use crate::error::Result;
use crate::monitor::Monitor;
use crate::pricing::{MintCalculator, PriceAggregator};
use crate::sources::{CoinGeckoSource, CoinMarketCapSource, QuoteSource};
use crate::types::Asset;

#[derive(Parser)]
#[command(author, version, about = "VVV/DIEM price, arbitrage and valuation monitor", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll continuously and serve the HTTP API (default)
    Run,

    /// Run one cycle and print the analysis without sending alerts
    Check {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Query every quote source once per asset
    TestSources,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    let result = match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(cfg).await,
        Commands::Check { json } => check(cfg, json).await,
        Commands::TestSources => test_sources(cfg).await,
    };

    if let Err(e) = result {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    let history = PriceHistory::open(&cfg.db_path).await?;
    let latency = Arc::new(SourceLatency::new());
    let health = Arc::new(HealthState::new());

    let monitor = Monitor::new(
        &cfg,
        PriceAggregator::new(build_sources(&cfg)?, Arc::clone(&latency)),
        MintCalculator::new(cfg.mint_rate_api_url.clone(), cfg.diem_supply_estimate)?,
        build_notifier(&cfg),
        history.clone(),
        Arc::clone(&health),
    );
    tokio::spawn(async move { monitor.run().await });

    // HTTP API server
    let app = router(ApiState {
        history,
        health,
        latency,
        history_days: cfg.history_days,
    });
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}

async fn check(cfg: Config, json: bool) -> Result<()> {
    let history = PriceHistory::open_read_only(&cfg.db_path).await?;
    let mut monitor = Monitor::new(
        &cfg,
        PriceAggregator::new(build_sources(&cfg)?, Arc::new(SourceLatency::new())),
        MintCalculator::new(cfg.mint_rate_api_url.clone(), cfg.diem_supply_estimate)?,
        Box::new(LogNotifier),
        history,
        Arc::new(HealthState::new()),
    );

    let report = monitor.check_once().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{report}");
    }
    Ok(())
}

async fn test_sources(cfg: Config) -> Result<()> {
    let sources = build_sources(&cfg)?;
    for source in &sources {
        for asset in Asset::ALL {
            match source.fetch_quote(asset).await {
                Ok(quote) => {
                    let volume = quote
                        .volume_24h
                        .map_or_else(|| "n/a".to_string(), |v| format!("${v:.0}"));
                    println!(
                        "{:<14} {:<5} ${:.4}  (24h volume {volume})",
                        source.name(),
                        asset.symbol(),
                        quote.price
                    );
                }
                Err(e) => println!("{:<14} {:<5} FAILED: {e}", source.name(), asset.symbol()),
            }
        }
    }

    let aggregator = PriceAggregator::new(sources, Arc::new(SourceLatency::new()));
    for asset in Asset::ALL {
        match aggregator.get_price(asset).await {
            Some(price) => println!(
                "{:<14} {:<5} ${:.4}  ({} sources)",
                "median",
                asset.symbol(),
                price.value,
                price.source_count
            ),
            None => println!("{:<14} {:<5} no usable price", "median", asset.symbol()),
        }
    }
    Ok(())
}

/// CoinGecko always; CoinMarketCap only with a key.
fn build_sources(cfg: &Config) -> Result<Vec<Box<dyn QuoteSource>>> {
    let mut sources: Vec<Box<dyn QuoteSource>> = vec![Box::new(CoinGeckoSource::new(
        cfg.coingecko_api_url.clone(),
        cfg.coingecko_api_key.clone(),
    )?)];

    match &cfg.coinmarketcap_api_key {
        Some(key) => sources.push(Box::new(CoinMarketCapSource::new(
            cfg.coinmarketcap_api_url.clone(),
            key.clone(),
        )?)),
        None => warn!("COINMARKETCAP_API_KEY not set: pricing from CoinGecko only"),
    }

    info!(
        "Quote sources: {}",
        sources.iter().map(|s| s.name()).collect::<Vec<_>>().join(", ")
    );
    Ok(sources)
}

fn build_notifier(cfg: &Config) -> Box<dyn Notifier> {
    if cfg.caelum_enabled {
        let notifier = CaelumNotifier::new(&cfg.caelum_host, cfg.caelum_port);
        info!("Alerts go to Caelum at {}", notifier.addr());
        Box::new(notifier)
    } else {
        info!("CAELUM_ENABLED is off: alerts are logged only");
        Box::new(LogNotifier)
    }
}
