use crate::error::{AppError, Result};

pub const COINGECKO_API_URL: &str = "https://api.coingecko.com/api/v3";
pub const COINMARKETCAP_API_URL: &str = "https://pro-api.coinmarketcap.com/v2";
pub const MINT_RATE_API_URL: &str = "https://diem-calculator.venice.ai/api/mint-rate";

/// Per-request timeout for quote sources and the mint rate endpoint (seconds).
pub const SOURCE_TIMEOUT_SECS: u64 = 10;

/// Minimum spacing between two requests to the same quote source (milliseconds).
/// The free CoinGecko tier throttles hard, so it gets the wider gap.
pub const COINGECKO_MIN_INTERVAL_MS: u64 = 2_000;
pub const COINMARKETCAP_MIN_INTERVAL_MS: u64 = 1_000;

/// Connect/write/read budget for one notification delivery (seconds).
pub const NOTIFY_TIMEOUT_SECS: u64 = 5;

/// Fixed category tag attached to every notification.
pub const NOTIFICATION_CATEGORY: &str = "venice_monitor";

/// Placeholder DIEM supply used by the mint rate estimate. There is no live
/// supply source yet; override with DIEM_SUPPLY_ESTIMATE once one exists.
pub const DEFAULT_DIEM_SUPPLY_ESTIMATE: f64 = 32_000.0;

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub db_path: String,
    pub api_port: u16,
    /// Seconds between polling cycles (CHECK_INTERVAL_SECONDS)
    pub check_interval_secs: u64,
    /// Minimum mint-and-sell spread, in percent, to call an arbitrage profitable (MIN_PROFIT_PERCENT)
    pub min_profit_percent: f64,
    /// Annual discount rate for the DIEM perpetuity (DCF_DISCOUNT_RATE)
    pub dcf_discount_rate: f64,
    /// RSI level below which VVV counts as oversold (RSI_OVERSOLD)
    pub rsi_oversold: f64,
    /// Number of deltas in the RSI window (RSI_PERIOD)
    pub rsi_period: usize,
    /// Drop from recent high, in percent, that raises a PRICE_DROP signal (PRICE_DROP_PERCENT)
    pub price_drop_percent: f64,
    /// Number of most-recent samples used for price action (PRICE_ACTION_LOOKBACK)
    pub price_action_lookback: usize,
    /// Current/average volume ratio that raises a VOLUME_SPIKE signal (VOLUME_SPIKE_MULTIPLIER)
    pub volume_spike_multiplier: f64,
    /// Minimum spread between two sources, in percent, to report (CROSS_EXCHANGE_MIN_SPREAD_PERCENT)
    pub cross_exchange_min_spread_percent: f64,
    /// Days of stored history fed into momentum analysis (HISTORY_DAYS)
    pub history_days: u32,
    pub coingecko_api_url: String,
    pub coingecko_api_key: Option<String>,
    pub coinmarketcap_api_url: String,
    /// CoinMarketCap is only queried when a key is present (COINMARKETCAP_API_KEY)
    pub coinmarketcap_api_key: Option<String>,
    pub mint_rate_api_url: String,
    pub diem_supply_estimate: f64,
    pub caelum_enabled: bool,
    pub caelum_host: String,
    pub caelum_port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "price_history.db".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            check_interval_secs: std::env::var("CHECK_INTERVAL_SECONDS")
                .unwrap_or_else(|_| "300".to_string())
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or_else(|| {
                    AppError::Config("CHECK_INTERVAL_SECONDS must be a positive integer".to_string())
                })?,
            min_profit_percent: env_f64("MIN_PROFIT_PERCENT", 5.0),
            dcf_discount_rate: env_f64("DCF_DISCOUNT_RATE", 0.25),
            rsi_oversold: env_f64("RSI_OVERSOLD", 30.0),
            rsi_period: std::env::var("RSI_PERIOD")
                .unwrap_or_else(|_| "14".to_string())
                .parse::<usize>()
                .unwrap_or(14),
            price_drop_percent: env_f64("PRICE_DROP_PERCENT", 15.0),
            price_action_lookback: std::env::var("PRICE_ACTION_LOOKBACK")
                .unwrap_or_else(|_| "7".to_string())
                .parse::<usize>()
                .unwrap_or(7),
            volume_spike_multiplier: env_f64("VOLUME_SPIKE_MULTIPLIER", 2.0),
            cross_exchange_min_spread_percent: env_f64("CROSS_EXCHANGE_MIN_SPREAD_PERCENT", 5.0),
            history_days: std::env::var("HISTORY_DAYS")
                .unwrap_or_else(|_| "30".to_string())
                .parse::<u32>()
                .unwrap_or(30),
            coingecko_api_url: std::env::var("COINGECKO_API_URL")
                .unwrap_or_else(|_| COINGECKO_API_URL.to_string()),
            coingecko_api_key: env_opt("COINGECKO_API_KEY"),
            coinmarketcap_api_url: std::env::var("COINMARKETCAP_API_URL")
                .unwrap_or_else(|_| COINMARKETCAP_API_URL.to_string()),
            coinmarketcap_api_key: env_opt("COINMARKETCAP_API_KEY"),
            mint_rate_api_url: std::env::var("MINT_RATE_API_URL")
                .unwrap_or_else(|_| MINT_RATE_API_URL.to_string()),
            diem_supply_estimate: env_f64("DIEM_SUPPLY_ESTIMATE", DEFAULT_DIEM_SUPPLY_ESTIMATE),
            caelum_enabled: std::env::var("CAELUM_ENABLED")
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            caelum_host: std::env::var("CAELUM_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            caelum_port: std::env::var("CAELUM_PORT")
                .unwrap_or_else(|_| "8090".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("CAELUM_PORT must be a valid port number".to_string()))?,
        })
    }
}

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(default)
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
