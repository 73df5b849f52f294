//! Candle rows and the source-provenance tag carried through merges.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which tier of the fallback chain a row came from.
///
/// The priority ordering drives timestamp-collision resolution during the
/// reconcile step: live data is authoritative, cached data is preferred over
/// re-fetched archive data, and untagged rows always lose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DataSource {
    /// Row was read back from the local cache store.
    Cache,
    /// Row was decoded from a bulk archive payload.
    Archive,
    /// Row was fetched from the live endpoint.
    Live,
    /// Provenance unknown (e.g. rows constructed by callers).
    #[default]
    Unknown,
}

impl DataSource {
    /// Merge priority; higher wins a timestamp collision.
    #[must_use]
    pub const fn priority(self) -> u8 {
        match self {
            Self::Live => 3,
            Self::Cache => 2,
            Self::Archive => 1,
            Self::Unknown => 0,
        }
    }

    /// Stable lowercase label used in logs and span reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cache => "cache",
            Self::Archive => "archive",
            Self::Live => "live",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One OHLCV bar.
///
/// `open_time` is the inclusive start of the bar; `close_time` is the
/// inclusive end (for exchange data, `open_time + interval - 1ms`). A valid
/// series is strictly increasing in `open_time` with no duplicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Inclusive bar start.
    pub open_time: DateTime<Utc>,
    /// Inclusive bar end.
    pub close_time: DateTime<Utc>,
    /// Opening price.
    pub open: f64,
    /// Highest traded price in the bar.
    pub high: f64,
    /// Lowest traded price in the bar.
    pub low: f64,
    /// Closing price.
    pub close: f64,
    /// Base-asset volume.
    pub volume: f64,
    /// Quote-asset volume.
    pub quote_volume: f64,
    /// Number of trades in the bar.
    pub trade_count: u64,
    /// Taker-buy base-asset volume.
    pub taker_buy_base: f64,
    /// Taker-buy quote-asset volume.
    pub taker_buy_quote: f64,
    /// Which tier supplied this row.
    pub source: DataSource,
}
