// Shared fixtures for the pipeline integration suite.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};

use candela::{
    CacheConnector, CacheKey, Candela, CandelaBuilder, CandelaConnector, Candle, ChartType,
    DataSource, FundingRate, Interval, MarketType, ParquetStore, TimeRange,
};

/// Common symbol constants used across tests.
pub const BTC: &str = "BTCUSDT";
pub const ETH: &str = "ETHUSDT";
pub const SOL: &str = "SOLUSDT";

/// Cache provider label shared by every test orchestrator.
pub const PROVIDER: &str = "mock";

/// Construct a UTC `DateTime` from components for readability in tests.
pub const fn dt(
    y: i32,
    m: u32,
    d: u32,
    hh: u32,
    mm: u32,
    ss: u32,
) -> DateTime<Utc> {
    let date = chrono::NaiveDate::from_ymd_opt(y, m, d).expect("invalid date");
    let naive = date
        .and_hms_opt(hh, mm, ss)
        .expect("invalid time components");
    DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc)
}

/// Half-open range between two instants.
pub const fn tr(start: DateTime<Utc>, end: DateTime<Utc>) -> TimeRange {
    TimeRange { start, end }
}

/// One deterministic bar opening at `open_time`.
pub fn candle(open_time: DateTime<Utc>, interval: Interval) -> Candle {
    let base = 100.0 + (open_time.timestamp() % 600) as f64 / 10.0;
    Candle {
        open_time,
        close_time: open_time + interval.duration() - chrono::Duration::milliseconds(1),
        open: base,
        high: base + 1.0,
        low: base - 1.0,
        close: base + 0.5,
        volume: 10.0,
        quote_volume: base * 10.0,
        trade_count: 42,
        taker_buy_base: 5.0,
        taker_buy_quote: base * 5.0,
        source: DataSource::Unknown,
    }
}

/// `count` consecutive bars on the `interval` grid starting at `start`.
pub fn series(start: DateTime<Utc>, interval: Interval, count: usize) -> Vec<Candle> {
    (0..count)
        .map(|i| candle(start + interval.duration() * i as i32, interval))
        .collect()
}

/// One funding settlement at `funding_time`.
pub fn funding(funding_time: DateTime<Utc>, rate: f64) -> FundingRate {
    FundingRate {
        funding_time,
        funding_rate: rate,
        mark_price: Some(50_000.0),
        source: DataSource::Unknown,
    }
}

/// `count` settlements on the 8h grid starting at `start`.
pub fn funding_series(start: DateTime<Utc>, count: usize) -> Vec<FundingRate> {
    (0..count)
        .map(|i| funding(start + Interval::I8h.duration() * i as i32, 0.0001))
        .collect()
}

/// Fresh on-disk store rooted in a tempdir. Keep the guard alive for the
/// duration of the test or the cache files disappear mid-request.
pub fn temp_store() -> (tempfile::TempDir, Arc<ParquetStore>) {
    let dir = tempfile::tempdir().expect("create tempdir");
    let store = Arc::new(ParquetStore::open(dir.path()).expect("open parquet store"));
    (dir, store)
}

/// Builder pre-wired with a cache tier over `store` under the shared
/// provider label.
pub fn builder_over(store: &Arc<ParquetStore>) -> CandelaBuilder {
    Candela::builder().with_cache(CacheConnector::new(Arc::clone(store), PROVIDER))
}

/// Orchestrator over `connectors` with default configuration.
pub fn candela_over(
    store: &Arc<ParquetStore>,
    connectors: Vec<Arc<dyn CandelaConnector>>,
) -> Candela {
    let mut b = builder_over(store);
    for c in connectors {
        b = b.with_connector(c);
    }
    b.build().expect("valid test orchestrator")
}

/// Cache key for a candle day under the shared provider label.
pub fn day_key(market: MarketType, symbol: &str, interval: Interval, date: NaiveDate) -> CacheKey {
    CacheKey::derive(PROVIDER, ChartType::Klines, market, symbol, interval, date)
}

/// Cache key for a funding day under the shared provider label.
pub fn funding_key(market: MarketType, symbol: &str, date: NaiveDate) -> CacheKey {
    CacheKey::derive(
        PROVIDER,
        ChartType::FundingRate,
        market,
        symbol,
        Interval::I8h,
        date,
    )
}
