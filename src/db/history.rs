use std::path::Path;
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info, warn};

use crate::alerts::{AlertKind, Notification};
use crate::db::models::{AlertRow, MintRateRow, PriceRow};
use crate::error::Result;
use crate::types::{now_ns, AggregatedPrice, Asset, MintRateSample, PricePoint};

/// Source tag for the per-cycle median rows. Momentum history reads only these.
pub const AGGREGATED_SOURCE: &str = "aggregated";

const NS_PER_DAY: i64 = 86_400 * 1_000_000_000;
const NS_PER_HOUR: f64 = 3_600.0 * 1_000_000_000.0;

/// One stored aggregated sample.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryPoint {
    pub price: f64,
    pub volume_24h: Option<f64>,
    pub recorded_at_ns: i64,
}

/// Hours between two stored samples.
pub fn history_span_hours(oldest: &HistoryPoint, newest: &HistoryPoint) -> f64 {
    (newest.recorded_at_ns - oldest.recorded_at_ns) as f64 / NS_PER_HOUR
}

/// Append-only SQLite store for prices, mint rates and emitted alerts.
#[derive(Clone)]
pub struct PriceHistory {
    pool: SqlitePool,
}

impl PriceHistory {
    /// Opens (creating if needed) the database file and applies migrations.
    pub async fn open(db_path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{db_path}"))?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        let history = Self::from_pool(pool).await?;
        info!("Database ready at {db_path}");
        Ok(history)
    }

    /// Opens an existing database without writing to it. A missing file
    /// yields an empty in-memory store and nothing is created on disk.
    pub async fn open_read_only(db_path: &str) -> Result<Self> {
        if !Path::new(db_path).exists() {
            warn!("No database at {db_path}: running without price history");
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect("sqlite::memory:")
                .await?;
            return Self::from_pool(pool).await;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{db_path}"))?.read_only(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        info!("Database opened read-only at {db_path}");
        Ok(Self { pool })
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    /// Raw per-source quote.
    pub async fn save_price(&self, point: &PricePoint) -> Result<()> {
        self.insert_price(
            point.asset,
            point.price,
            &point.source,
            point.volume_24h,
            point.fetched_at_ns as i64,
        )
        .await
    }

    pub async fn save_aggregated(&self, price: &AggregatedPrice, recorded_at_ns: u64) -> Result<()> {
        self.insert_price(
            price.asset,
            price.value,
            AGGREGATED_SOURCE,
            price.volume_24h,
            recorded_at_ns as i64,
        )
        .await?;
        debug!(asset = %price.asset, price = price.value, "saved aggregated price");
        Ok(())
    }

    async fn insert_price(
        &self,
        asset: Asset,
        price: f64,
        source: &str,
        volume_24h: Option<f64>,
        recorded_at: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO prices (asset, price, source, volume_24h, recorded_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(asset.symbol())
        .bind(price)
        .bind(source)
        .bind(volume_24h)
        .bind(recorded_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn save_mint_rate(&self, sample: &MintRateSample) -> Result<()> {
        sqlx::query("INSERT INTO mint_rates (mint_rate, estimated, recorded_at) VALUES (?, ?, ?)")
            .bind(sample.rate)
            .bind(sample.estimated)
            .bind(sample.recorded_at_ns as i64)
            .execute(&self.pool)
            .await?;
        debug!(rate = sample.rate, estimated = sample.estimated, "saved mint rate");
        Ok(())
    }

    pub async fn save_alert(&self, kind: AlertKind, notification: &Notification) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO alerts (kind, title, message, priority, recorded_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(kind.to_string())
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.priority.to_string())
        .bind(now_ns() as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Aggregated samples for `asset` from the last `lookback_days`, most recent first.
    pub async fn get_history(&self, asset: Asset, lookback_days: u32) -> Result<Vec<HistoryPoint>> {
        let since = now_ns() as i64 - i64::from(lookback_days) * NS_PER_DAY;
        let rows: Vec<(f64, Option<f64>, i64)> = sqlx::query_as(
            r#"
            SELECT price, volume_24h, recorded_at
            FROM prices
            WHERE asset = ? AND source = ? AND recorded_at > ?
            ORDER BY recorded_at DESC, id DESC
            "#,
        )
        .bind(asset.symbol())
        .bind(AGGREGATED_SOURCE)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        let points: Vec<HistoryPoint> = rows
            .into_iter()
            .map(|(price, volume_24h, recorded_at_ns)| HistoryPoint {
                price,
                volume_24h,
                recorded_at_ns,
            })
            .collect();

        if let (Some(newest), Some(oldest)) = (points.first(), points.last()) {
            debug!(
                asset = %asset,
                rows = points.len(),
                lookback_days,
                span_hours = history_span_hours(oldest, newest),
                "loaded price history"
            );
        } else {
            debug!(asset = %asset, lookback_days, "no price history in window");
        }
        Ok(points)
    }

    /// All stored rows for `asset` (per-source and aggregated), newest first.
    pub async fn price_rows(&self, asset: Asset, lookback_days: u32, limit: i64) -> Result<Vec<PriceRow>> {
        let since = now_ns() as i64 - i64::from(lookback_days) * NS_PER_DAY;
        let rows = sqlx::query_as::<_, PriceRow>(
            r#"
            SELECT id, asset, price, source, volume_24h, recorded_at
            FROM prices
            WHERE asset = ? AND recorded_at > ?
            ORDER BY recorded_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(asset.symbol())
        .bind(since)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn recent_mint_rates(&self, limit: i64) -> Result<Vec<MintRateRow>> {
        let rows = sqlx::query_as::<_, MintRateRow>(
            "SELECT id, mint_rate, estimated, recorded_at FROM mint_rates ORDER BY recorded_at DESC, id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn recent_alerts(&self, limit: i64) -> Result<Vec<AlertRow>> {
        let rows = sqlx::query_as::<_, AlertRow>(
            "SELECT id, kind, title, message, priority, recorded_at FROM alerts ORDER BY recorded_at DESC, id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;

    /// Fresh migrated in-memory store. One connection so every query sees the same database.
    pub async fn memory_store() -> PriceHistory {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        PriceHistory::from_pool(pool).await.unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::testing::memory_store;
    use super::*;
    use crate::alerts::Priority;

    fn aggregated(asset: Asset, value: f64) -> AggregatedPrice {
        AggregatedPrice {
            asset,
            value,
            source_count: 2,
            volume_24h: Some(1_000.0),
        }
    }

    #[tokio::test]
    async fn history_is_most_recent_first_and_aggregated_only() {
        let store = memory_store().await;
        let now = now_ns();
        store.save_aggregated(&aggregated(Asset::Vvv, 1.0), now - 3_000).await.unwrap();
        store.save_aggregated(&aggregated(Asset::Vvv, 1.1), now - 2_000).await.unwrap();
        store.save_aggregated(&aggregated(Asset::Vvv, 1.2), now - 1_000).await.unwrap();
        store.save_aggregated(&aggregated(Asset::Diem, 250.0), now).await.unwrap();
        store
            .save_price(&PricePoint {
                asset: Asset::Vvv,
                price: 9.9,
                source: "coingecko".to_string(),
                volume_24h: None,
                fetched_at_ns: now,
            })
            .await
            .unwrap();

        let history = store.get_history(Asset::Vvv, 30).await.unwrap();
        let prices: Vec<f64> = history.iter().map(|h| h.price).collect();
        assert_eq!(prices, vec![1.2, 1.1, 1.0]);
        assert_eq!(history[0].volume_24h, Some(1_000.0));
        assert!(history
            .windows(2)
            .all(|pair| pair[0].recorded_at_ns > pair[1].recorded_at_ns));
        let span = history_span_hours(&history[2], &history[0]);
        assert!((span - 2_000.0 / NS_PER_HOUR).abs() < 1e-12);

        let rows = store.price_rows(Asset::Vvv, 30, 10).await.unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].source, "coingecko");
    }

    #[test]
    fn span_is_measured_in_hours() {
        let point = |hours: i64| HistoryPoint {
            price: 1.0,
            volume_24h: None,
            recorded_at_ns: hours * 3_600 * 1_000_000_000,
        };
        assert_eq!(history_span_hours(&point(2), &point(26)), 24.0);
    }

    #[tokio::test]
    async fn read_only_open_of_missing_file_creates_nothing() {
        let path = std::env::temp_dir().join(format!("venice-monitor-missing-{}.db", now_ns()));
        let path_str = path.to_string_lossy().to_string();

        let store = PriceHistory::open_read_only(&path_str).await.unwrap();
        assert!(store.get_history(Asset::Diem, 30).await.unwrap().is_empty());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn read_only_open_reads_existing_file_and_rejects_writes() {
        let path = std::env::temp_dir().join(format!("venice-monitor-ro-{}.db", now_ns()));
        let path_str = path.to_string_lossy().to_string();

        let writer = PriceHistory::open(&path_str).await.unwrap();
        writer
            .save_aggregated(&aggregated(Asset::Diem, 250.0), now_ns())
            .await
            .unwrap();
        writer.pool.close().await;

        let reader = PriceHistory::open_read_only(&path_str).await.unwrap();
        let history = reader.get_history(Asset::Diem, 30).await.unwrap();
        assert_eq!(history.len(), 1);
        assert!(reader
            .save_aggregated(&aggregated(Asset::Diem, 260.0), now_ns())
            .await
            .is_err());

        reader.pool.close().await;
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn history_respects_lookback_window() {
        let store = memory_store().await;
        let now = now_ns();
        let old = now - 40 * NS_PER_DAY as u64;
        store.save_aggregated(&aggregated(Asset::Diem, 200.0), old).await.unwrap();
        store.save_aggregated(&aggregated(Asset::Diem, 250.0), now).await.unwrap();

        let history = store.get_history(Asset::Diem, 30).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].price, 250.0);
    }

    #[tokio::test]
    async fn mint_rates_and_alerts_round_trip() {
        let store = memory_store().await;
        store
            .save_mint_rate(&MintRateSample {
                rate: 231.0,
                estimated: true,
                recorded_at_ns: now_ns(),
            })
            .await
            .unwrap();
        let rates = store.recent_mint_rates(5).await.unwrap();
        assert_eq!(rates.len(), 1);
        assert!(rates[0].estimated);

        let notification = Notification::new(
            "VVV BUY".to_string(),
            "Score: 3".to_string(),
            Priority::Medium,
            serde_json::Value::Null,
        );
        store.save_alert(AlertKind::Momentum, &notification).await.unwrap();
        let alerts = store.recent_alerts(5).await.unwrap();
        assert_eq!(alerts[0].kind, "momentum");
        assert_eq!(alerts[0].priority, "medium");
    }
}
