use async_trait::async_trait;
use chrono::NaiveDate;

use crate::types::{
    ArchiveDay, Candle, CandelaError, DataSource, FundingRate, Interval, MarketType, TimeRange,
};
pub use candela_types::ConnectorKey;

/// Focused role trait for connectors that provide OHLCV candles.
#[async_trait]
pub trait KlineProvider: Send + Sync {
    /// Fetch candles for `symbol` over the half-open `range`.
    ///
    /// Implementations return rows sorted ascending by `open_time`, clipped to
    /// the range, and never pad: a thinner-than-requested result is how
    /// "partially available" is expressed. Provenance tagging is normalized by
    /// the caller, so implementations need not set `source` consistently.
    async fn klines(
        &self,
        symbol: &str,
        market: MarketType,
        interval: Interval,
        range: TimeRange,
    ) -> Result<Vec<Candle>, CandelaError>;

    /// Whether this source can serve any part of `range` right now.
    ///
    /// Default: claims availability. Sources with structural blackouts (e.g.
    /// a bulk archive that lags real time by a settlement window) override
    /// this so the orchestrator can skip them without treating the skip as a
    /// failure.
    async fn is_available(&self, range: TimeRange) -> bool {
        let _ = range;
        true
    }

    /// Exact intervals this connector can natively serve for the market.
    fn supported_intervals(&self, market: MarketType) -> &'static [Interval] {
        let _ = market;
        &Interval::ALL
    }
}

/// Focused role trait for bulk archives that publish whole UTC days.
///
/// Day granularity is what lets the orchestrator cache at day granularity
/// and decide persistence per day: a payload is only ever persisted when its
/// [`ArchiveDay::verified`] flag is set.
#[async_trait]
pub trait ArchiveDayProvider: Send + Sync {
    /// Fetch and decode one published day.
    ///
    /// An unpublished or absent day is a [`CandelaError::NotFound`], which
    /// callers treat as "this tier has nothing", not as a failure. Integrity
    /// faults the archive refuses to tolerate surface as
    /// [`CandelaError::Integrity`].
    async fn fetch_day(
        &self,
        symbol: &str,
        market: MarketType,
        interval: Interval,
        date: NaiveDate,
    ) -> Result<ArchiveDay, CandelaError>;

    /// Whether `date` could plausibly be published yet.
    ///
    /// Bulk archives trail real time by a settlement window; skipping days
    /// that cannot exist avoids a guaranteed round trip per request. Default:
    /// claims availability.
    fn day_available(&self, date: NaiveDate) -> bool {
        let _ = date;
        true
    }
}

/// Focused role trait for connectors that provide funding-rate settlements.
#[async_trait]
pub trait FundingRateProvider: Send + Sync {
    /// Fetch funding settlements for `symbol` over the half-open `range`.
    ///
    /// Rows come back sorted ascending by `funding_time` and clipped to the
    /// range.
    async fn funding_rates(
        &self,
        symbol: &str,
        market: MarketType,
        range: TimeRange,
    ) -> Result<Vec<FundingRate>, CandelaError>;
}

/// Main connector trait implemented by source adapters. Exposes capability discovery.
pub trait CandelaConnector: Send + Sync {
    /// A stable identifier for builder validation (e.g., "candela-binance-live").
    fn name(&self) -> &'static str;

    /// Canonical connector key constructed from the static name.
    fn key(&self) -> ConnectorKey {
        ConnectorKey::new(self.name())
    }

    /// Human-friendly vendor string.
    fn vendor(&self) -> &'static str {
        "unknown"
    }

    /// Provenance tier this connector feeds; rows it supplies are re-tagged
    /// with this source during orchestration.
    fn source(&self) -> DataSource;

    /// Whether this connector *claims* to support a given market type.
    ///
    /// Default: returns `false` for all markets. Connectors must explicitly
    /// override this method to declare which markets they support.
    fn supports_market(&self, market: MarketType) -> bool {
        let _ = market;
        false
    }

    /// Advertise candle capability by returning a usable trait object reference when supported.
    fn as_kline_provider(&self) -> Option<&dyn KlineProvider> {
        None
    }

    /// If implemented, returns a trait object for funding-rate retrieval.
    fn as_funding_rate_provider(&self) -> Option<&dyn FundingRateProvider> {
        None
    }

    /// If implemented, returns a trait object for day-granular archive retrieval.
    fn as_archive_provider(&self) -> Option<&dyn ArchiveDayProvider> {
        None
    }
}
