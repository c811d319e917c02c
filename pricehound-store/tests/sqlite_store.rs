use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use pricehound_common::{PriceRecord, PriceStore};
use pricehound_store::SqlitePriceStore;
use rust_decimal::Decimal;
use tempfile::TempDir;

fn at(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

fn rec(name: &str, price: &str, observed_at: DateTime<Utc>) -> PriceRecord {
    PriceRecord::new(name, Decimal::from_str(price).unwrap(), observed_at)
}

#[tokio::test]
async fn saves_and_reads_back_with_scale() -> anyhow::Result<()> {
    let store = SqlitePriceStore::connect("sqlite::memory:").await?;
    let t0 = at("2025-03-10T13:00:00Z");

    store.save(&rec("petr4", "45.10", t0)).await?;

    let latest = store.latest("petr4").await?.expect("one record");
    assert_eq!(latest.price.to_string(), "45.10");
    assert_eq!(latest.observed_at, t0);
    assert_eq!(latest.name, "petr4");
    Ok(())
}

#[tokio::test]
async fn history_is_newest_first_and_limited() -> anyhow::Result<()> {
    let store = SqlitePriceStore::connect("sqlite::memory:").await?;
    let t0 = at("2025-03-10T13:00:00Z");
    for (i, p) in ["30.00", "31.50", "0.0"].iter().enumerate() {
        store.save(&rec("petr4", p, t0 + Duration::minutes(i as i64))).await?;
    }
    store.save(&rec("vale3", "60.01", t0)).await?;

    let hist = store.history("petr4", 2).await?;
    let prices: Vec<String> = hist.iter().map(|r| r.price.to_string()).collect();
    assert_eq!(prices, vec!["0.0", "31.50"]);
    assert!(store.latest("itub4").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn file_database_survives_reconnect() -> anyhow::Result<()> {
    let tmp = TempDir::new()?;
    let url = format!("sqlite://{}", tmp.path().join("prices.db").display());

    {
        let store = SqlitePriceStore::connect(&url).await?;
        store.save(&rec("bbdc4", "14.87", at("2025-03-10T13:00:00Z"))).await?;
        store.pool().close().await;
    }

    let store = SqlitePriceStore::connect(&url).await?;
    let latest = store.latest("bbdc4").await?.expect("persisted");
    assert_eq!(latest.price.to_string(), "14.87");
    Ok(())
}

#[tokio::test]
async fn corrupt_rows_surface_as_errors() -> anyhow::Result<()> {
    let store = SqlitePriceStore::connect("sqlite::memory:").await?;
    sqlx::query("INSERT INTO stock_price (name, price, observed_at) VALUES ('x', 'abc', '2025-01-01T00:00:00Z')")
        .execute(store.pool())
        .await?;

    let err = store.latest("x").await.unwrap_err();
    assert!(err.to_string().contains("corrupt price"));
    Ok(())
}
