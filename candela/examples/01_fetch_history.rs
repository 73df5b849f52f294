mod common;

use candela::{CacheConnector, Candela, Interval, MarketType, ParquetStore, TimeRange};
use common::get_connectors;

use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Open a cache store. Reruns of this example resolve from it instead
    // of going back to the network.
    let store = Arc::new(ParquetStore::open("./candela-cache")?);

    // 2. Build the orchestrator over the archive and live tiers.
    let mut builder = Candela::builder().with_cache(CacheConnector::new(store, "binance"));
    for connector in get_connectors() {
        builder = builder.with_connector(connector);
    }
    let candela = builder.build()?;

    // 3. Ask for one hour of minute bars from a settled day.
    let range = TimeRange {
        start: "2024-03-05T10:00:00Z".parse()?,
        end: "2024-03-05T11:00:00Z".parse()?,
    };
    println!(
        "Fetching 1m candles for BTCUSDT over {} .. {}...",
        range.start, range.end
    );

    // 4. Fetch *with the report* to see coverage and tier attribution.
    let report = candela
        .klines_with_report("BTCUSDT", MarketType::Spot, Interval::I1m, range)
        .await?;

    // 5. Print the results.
    println!("\n## Merged Series ({} candles):", report.candles.len());
    for candle in report.candles.iter().take(5) {
        // Print first 5
        println!(
            " - {} open {:.2} close {:.2} [{:?}]",
            candle.open_time, candle.open, candle.close, candle.source
        );
    }
    if report.candles.len() > 5 {
        println!("... and more");
    }

    println!("\n## Tier Attribution:");
    for span in &report.spans {
        println!(
            " - {:?} covered {} .. {} ({} rows)",
            span.source, span.start, span.end, span.rows
        );
    }

    println!(
        "\n## Coverage: {}/{} rows",
        report.coverage.actual_rows, report.coverage.expected_rows
    );
    for warning in &report.warnings {
        println!(" ! {warning}");
    }

    Ok(())
}
