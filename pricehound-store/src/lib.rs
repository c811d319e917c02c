//! SQLite persistence for price observations.
//!
//! Prices are stored as canonical decimal text so the scale read back is the
//! scale that was extracted (`45.10` stays `45.10`). Timestamps are RFC 3339
//! in UTC.
use std::str::FromStr;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pricehound_common::{PriceRecord, PriceStore, PricehoundError};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS stock_price (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL,
    price       TEXT NOT NULL,
    observed_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS stock_price_name_observed
    ON stock_price (name, observed_at DESC);
"#;

#[derive(Debug, Clone)]
pub struct SqlitePriceStore {
    pool: SqlitePool,
}

impl SqlitePriceStore {
    /// Connect (creating the database file if needed) and ensure the schema.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("invalid database url: {database_url}"))?
            .create_if_missing(true);
        // In-memory databases are per-connection.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 4 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .with_context(|| format!("failed to open database: {database_url}"))?;
        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::raw_sql(SCHEMA)
            .execute(&pool)
            .await
            .context("failed to create stock_price schema")?;
        info!("store.schema.ready");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Most recent observation for `name`, if any.
    pub async fn latest(&self, name: &str) -> Result<Option<PriceRecord>> {
        Ok(self.history(name, 1).await?.into_iter().next())
    }

    /// Observations for `name`, newest first.
    pub async fn history(&self, name: &str, limit: i64) -> Result<Vec<PriceRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT name, price, observed_at
            FROM stock_price
            WHERE name = ?
            ORDER BY observed_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(name)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        debug!(name, rows = rows.len(), "store.history");

        rows.into_iter().map(|r| row_to_record(&r)).collect()
    }
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> Result<PriceRecord> {
    let name: String = row.try_get("name")?;
    let price: String = row.try_get("price")?;
    let observed_at: String = row.try_get("observed_at")?;

    let price = Decimal::from_str(&price).map_err(|e| {
        PricehoundError::Storage(format!("corrupt price {price:?} for {name}: {e}"))
    })?;
    let observed_at = DateTime::parse_from_rfc3339(&observed_at)
        .map_err(|e| {
            PricehoundError::Storage(format!("corrupt timestamp {observed_at:?} for {name}: {e}"))
        })?
        .with_timezone(&Utc);

    Ok(PriceRecord {
        name,
        price,
        observed_at,
    })
}

#[async_trait]
impl PriceStore for SqlitePriceStore {
    async fn save(&self, record: &PriceRecord) -> Result<()> {
        sqlx::query("INSERT INTO stock_price (name, price, observed_at) VALUES (?, ?, ?)")
            .bind(&record.name)
            .bind(record.price.to_string())
            .bind(record.observed_at.to_rfc3339())
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to insert price for {}", record.name))?;
        debug!(name = %record.name, price = %record.price, "store.save");
        Ok(())
    }
}
