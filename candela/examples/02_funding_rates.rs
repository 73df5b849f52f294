mod common;

use candela::{CacheConnector, Candela, MarketType, ParquetStore, TimeRange};
use common::get_connectors;

use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Funding settlements only exist on the futures markets, but the
    // orchestrator is built the same way as for candles.
    let store = Arc::new(ParquetStore::open("./candela-cache")?);
    let mut builder = Candela::builder().with_cache(CacheConnector::new(store, "binance"));
    for connector in get_connectors() {
        builder = builder.with_connector(connector);
    }
    let candela = builder.build()?;

    // 2. Three days of settlements on the fixed 8h grid.
    let range = TimeRange {
        start: "2024-03-04T00:00:00Z".parse()?,
        end: "2024-03-07T00:00:00Z".parse()?,
    };
    println!("Fetching funding rates for BTCUSDT (USD-M futures)...");

    let report = candela
        .funding_rates_with_report("BTCUSDT", MarketType::UmFutures, range)
        .await?;

    // 3. Print settlement times and rates.
    println!("\n## Settlements ({} rows):", report.rates.len());
    for rate in &report.rates {
        println!(
            " - {} rate {:+.6}% [{:?}]",
            rate.funding_time,
            rate.funding_rate * 100.0,
            rate.source
        );
    }
    println!(
        "\n## Coverage: {}/{} rows",
        report.coverage.actual_rows, report.coverage.expected_rows
    );

    Ok(())
}
