mod common;

use candela::{CacheConnector, Candela, Interval, MarketType, ParquetStore, TimeRange};
use common::get_connectors;

use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Build the orchestrator. The shared cache makes reruns incremental:
    // already-downloaded days never leave disk.
    let store = Arc::new(ParquetStore::open("./candela-cache")?);
    let mut builder = Candela::builder().with_cache(CacheConnector::new(store, "binance"));
    for connector in get_connectors() {
        builder = builder.with_connector(connector);
    }
    let candela = builder.build()?;

    // 2. One day of hourly bars across a small basket.
    let range = TimeRange {
        start: "2024-03-05T00:00:00Z".parse()?,
        end: "2024-03-06T00:00:00Z".parse()?,
    };
    println!("Downloading 1h candles for 3 symbols...");

    // 3. The builder fans symbols out concurrently under the configured cap
    // and keeps one report per symbol.
    let report = candela
        .download()
        .symbols(["BTCUSDT", "ETHUSDT", "SOLUSDT"])?
        .market(MarketType::Spot)
        .interval(Interval::I1h)
        .range(range)
        .deadline(Duration::from_secs(120))
        .run()
        .await?;

    // 4. Summarize per-symbol outcomes.
    println!("\n## Batch Results:");
    for series in &report.series {
        println!(
            " - {}: {} rows, coverage {}/{}",
            series.symbol,
            series.candles.len(),
            series.coverage.actual_rows,
            series.coverage.expected_rows
        );
    }
    for warning in &report.warnings {
        println!(" ! {warning}");
    }

    Ok(())
}
