use async_trait::async_trait;
use chrono::NaiveDate;

use candela_core::connector::{
    ArchiveDayProvider, CandelaConnector, FundingRateProvider, KlineProvider,
};
use candela_core::{
    ArchiveDay, Candle, CandelaError, DataSource, FundingRate, Interval, MarketType, TimeRange,
};

mod dynamic;
mod fixtures;

pub use dynamic::{DynamicMockConnector, DynamicMockController, MockBehavior};

/// Mock connector for CI-safe tests. Synthesizes a deterministic series on
/// the requested grid, so any symbol resolves except the trigger symbols:
/// `"FAIL"` errors immediately, `"TIMEOUT"` stalls long enough for short
/// per-call deadlines to expire, `"EMPTY"` returns no rows, `"MISSING"`
/// reports not-found, and `"UNVERIFIED"` serves archive days that failed
/// verification.
pub struct MockConnector {
    source: DataSource,
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl MockConnector {
    /// A mock that reports itself as a live-tier source.
    #[must_use]
    pub const fn new() -> Self {
        Self::with_source(DataSource::Live)
    }

    /// A mock reporting the given provenance tier.
    #[must_use]
    pub const fn with_source(source: DataSource) -> Self {
        Self { source }
    }

    fn not_found(what: &str) -> CandelaError {
        CandelaError::not_found(what.to_string())
    }

    async fn maybe_fail_or_timeout(
        symbol: &str,
        capability: &'static str,
    ) -> Result<(), CandelaError> {
        match symbol {
            "FAIL" => Err(CandelaError::connector(
                "candela-mock",
                format!("forced failure: {capability}"),
            )),
            "TIMEOUT" => {
                // Awaited so per-call timeouts can fire; kept short so tests
                // without one stay fast
                tokio::time::sleep(std::time::Duration::from_millis(200)).await;
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

impl CandelaConnector for MockConnector {
    fn name(&self) -> &'static str {
        "candela-mock"
    }

    fn vendor(&self) -> &'static str {
        "Mock"
    }

    fn source(&self) -> DataSource {
        self.source
    }

    fn supports_market(&self, _market: MarketType) -> bool {
        true
    }

    fn as_kline_provider(&self) -> Option<&dyn KlineProvider> {
        Some(self as &dyn KlineProvider)
    }

    fn as_funding_rate_provider(&self) -> Option<&dyn FundingRateProvider> {
        Some(self as &dyn FundingRateProvider)
    }

    fn as_archive_provider(&self) -> Option<&dyn ArchiveDayProvider> {
        Some(self as &dyn ArchiveDayProvider)
    }
}

#[async_trait]
impl KlineProvider for MockConnector {
    async fn klines(
        &self,
        symbol: &str,
        _market: MarketType,
        interval: Interval,
        range: TimeRange,
    ) -> Result<Vec<Candle>, CandelaError> {
        Self::maybe_fail_or_timeout(symbol, "klines").await?;
        match symbol {
            "EMPTY" => Ok(Vec::new()),
            "MISSING" => Err(Self::not_found(&format!("klines for {symbol}"))),
            _ => Ok(fixtures::klines::series(symbol, interval, range, self.source)),
        }
    }
}

#[async_trait]
impl FundingRateProvider for MockConnector {
    async fn funding_rates(
        &self,
        symbol: &str,
        market: MarketType,
        range: TimeRange,
    ) -> Result<Vec<FundingRate>, CandelaError> {
        if !market.has_funding() {
            return Err(CandelaError::unsupported("funding-rates"));
        }
        Self::maybe_fail_or_timeout(symbol, "funding-rates").await?;
        match symbol {
            "EMPTY" => Ok(Vec::new()),
            "MISSING" => Err(Self::not_found(&format!("funding rates for {symbol}"))),
            _ => Ok(fixtures::funding::series(symbol, range, self.source)),
        }
    }
}

#[async_trait]
impl ArchiveDayProvider for MockConnector {
    async fn fetch_day(
        &self,
        symbol: &str,
        _market: MarketType,
        interval: Interval,
        date: NaiveDate,
    ) -> Result<ArchiveDay, CandelaError> {
        Self::maybe_fail_or_timeout(symbol, "archive-days").await?;
        match symbol {
            // An archive cannot publish an empty day, so both triggers read
            // as "nothing at this tier"
            "EMPTY" | "MISSING" => Err(Self::not_found(&format!("archive day {date}"))),
            "UNVERIFIED" => Ok(ArchiveDay {
                date,
                candles: fixtures::klines::day(symbol, interval, date, self.source),
                verified: false,
                warning: Some(format!("integrity unverifiable for {date}: no sidecar")),
            }),
            _ => Ok(ArchiveDay {
                date,
                candles: fixtures::klines::day(symbol, interval, date, self.source),
                verified: true,
                warning: None,
            }),
        }
    }
}
