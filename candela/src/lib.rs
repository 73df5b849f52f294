//! Candela reconciles candle and funding-rate series across storage tiers.
//!
//! Overview
//! - Serves one request from three tiers in cost order: local cache, bulk
//!   day-sharded archives, live REST endpoints.
//! - Persists verified archive days and live rows back to the cache, so
//!   repeated requests converge on local reads.
//! - Plans fetches on the bar grid: only missing spans are requested, and
//!   the tiers' rows merge into one ascending de-duplicated series carrying
//!   provenance tags.
//! - Normalizes error handling and exposes uniform domain types from
//!   `candela_core`.
//!
//! Key behaviors and trade-offs
//! - Failover: a tier failure is absorbed and the next tier covers for it;
//!   only a fully empty result surfaces as an error, with the per-tier
//!   failures aggregated inside it.
//! - Persistence: archive days are persisted only when checksum-verified;
//!   live rows are always cache-eligible and merge over existing days
//!   instead of clobbering them.
//! - Collisions: duplicate timestamps resolve by provenance priority (live
//!   over cache over archive), never by fetch order.
//! - Coverage: short results come back usable, with coverage accounting and
//!   a `PartialCoverage` warning; `strict_coverage` escalates the shortfall
//!   to an error for callers that need all-or-nothing.
//! - Deadlines: an optional request timeout abandons in-flight work at
//!   expiry and returns whatever has merged; zero rows at expiry is a
//!   `RequestTimeout`.
//!
//! Examples
//! Building an orchestrator over an archive, a live endpoint, and a cache:
//! ```rust,ignore
//! use std::sync::Arc;
//! use candela::{Candela, CacheConnector, ParquetStore};
//! use candela_binance::{BinanceArchive, BinanceLive};
//!
//! let store = Arc::new(ParquetStore::open("./cache")?);
//! let candela = Candela::builder()
//!     .with_connector(Arc::new(BinanceArchive::default()))
//!     .with_connector(Arc::new(BinanceLive::default()))
//!     .with_cache(CacheConnector::new(store, "binance"))
//!     .build()?;
//! ```
//!
//! Fetching a merged series with coverage accounting:
//! ```rust,ignore
//! use candela::{Interval, MarketType, TimeRange};
//!
//! let report = candela
//!     .klines_with_report("BTCUSDT", MarketType::Spot, Interval::I1m, range)
//!     .await?;
//! for span in &report.spans {
//!     println!("{} rows from {}", span.rows, span.source);
//! }
//! ```
//!
//! Bulk download helper (multi-symbol):
//! ```rust,ignore
//! use candela::{Interval, MarketType};
//!
//! let report = candela
//!     .download()
//!     .symbols(["BTCUSDT", "ETHUSDT"])?
//!     .market(MarketType::Spot)
//!     .interval(Interval::D1)
//!     .range(range)
//!     .run()
//!     .await?;
//! for fetched in &report.series {
//!     println!("{}: {} rows", fetched.symbol, fetched.candles.len());
//! }
//! ```
//!
//! See `candela/examples/` for runnable end-to-end demonstrations.
#![warn(missing_docs)]

pub(crate) mod core;
mod fetch;

pub use candela_core::types::{BackoffConfig, CandelaConfig, GapPolicy};
pub use core::{Candela, CandelaBuilder};
pub use fetch::download::DownloadBuilder;
pub use fetch::history::FetchPhase;
pub use fetch::util::collapse_errors;

pub use candela_store::{CacheConnector, CacheKey, ParquetStore};

// Re-export core types for convenience
pub use candela_core::{
    // Report envelopes
    Coverage,
    DownloadReport,
    FetchReport,
    FundingReport,
    SourceSpan,
    // Foundational types
    AlignedRange,
    ArchiveDay,
    Candle,
    CandelaError,
    Capability,
    ChartType,
    ConnectorKey,
    DataSource,
    FundingRate,
    Gap,
    GapStats,
    Interval,
    MarketType,
    TimeRange,
    // Metrics seam
    MetricsCollector,
    NoopMetrics,
    // Master connector trait
    CandelaConnector,
};

// Capability contracts for implementing custom connectors
pub use candela_core::connector::{ArchiveDayProvider, FundingRateProvider, KlineProvider};
