//! Closed market vocabulary: bar intervals, market types, chart types.
//!
//! These enums are exhaustive on purpose. Free-form strings are validated
//! once at the request boundary and everything downstream works with the
//! typed values, so an unknown interval can only ever surface as a
//! [`CandelaError::Validation`] and never as a malformed path or URL.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CandelaError;

/// Supported bar intervals, ascending by duration.
///
/// Calendar-ruled intervals (weeks, months) are not representable on the
/// fixed microsecond grid the aligner uses and are rejected at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Interval {
    /// 1 second (spot markets only).
    I1s,
    /// 1 minute.
    I1m,
    /// 3 minutes.
    I3m,
    /// 5 minutes.
    I5m,
    /// 15 minutes.
    I15m,
    /// 30 minutes.
    I30m,
    /// 1 hour.
    I1h,
    /// 2 hours.
    I2h,
    /// 4 hours.
    I4h,
    /// 6 hours.
    I6h,
    /// 8 hours.
    I8h,
    /// 12 hours.
    I12h,
    /// 1 day.
    D1,
    /// 3 days.
    D3,
}

impl Interval {
    /// All supported intervals, ascending.
    pub const ALL: [Self; 14] = [
        Self::I1s,
        Self::I1m,
        Self::I3m,
        Self::I5m,
        Self::I15m,
        Self::I30m,
        Self::I1h,
        Self::I2h,
        Self::I4h,
        Self::I6h,
        Self::I8h,
        Self::I12h,
        Self::D1,
        Self::D3,
    ];

    /// Wire/path label (e.g. `"1m"`), shared by the archive layout and the
    /// live endpoint.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::I1s => "1s",
            Self::I1m => "1m",
            Self::I3m => "3m",
            Self::I5m => "5m",
            Self::I15m => "15m",
            Self::I30m => "30m",
            Self::I1h => "1h",
            Self::I2h => "2h",
            Self::I4h => "4h",
            Self::I6h => "6h",
            Self::I8h => "8h",
            Self::I12h => "12h",
            Self::D1 => "1d",
            Self::D3 => "3d",
        }
    }

    /// Bar length in whole seconds.
    #[must_use]
    pub const fn as_secs(self) -> i64 {
        match self {
            Self::I1s => 1,
            Self::I1m => 60,
            Self::I3m => 180,
            Self::I5m => 300,
            Self::I15m => 900,
            Self::I30m => 1_800,
            Self::I1h => 3_600,
            Self::I2h => 7_200,
            Self::I4h => 14_400,
            Self::I6h => 21_600,
            Self::I8h => 28_800,
            Self::I12h => 43_200,
            Self::D1 => 86_400,
            Self::D3 => 259_200,
        }
    }

    /// Bar length in microseconds, the aligner's native tick.
    #[must_use]
    pub const fn as_micros(self) -> i64 {
        self.as_secs() * 1_000_000
    }

    /// Bar length as a `chrono::Duration`.
    #[must_use]
    pub fn duration(self) -> chrono::Duration {
        chrono::Duration::seconds(self.as_secs())
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = CandelaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|i| i.as_str() == s)
            .ok_or_else(|| CandelaError::validation(format!("unknown interval '{s}'")))
    }
}

/// Market family a symbol trades on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarketType {
    /// Spot market.
    Spot,
    /// USD(T)-margined perpetual/delivery futures.
    UmFutures,
    /// Coin-margined perpetual/delivery futures.
    CmFutures,
}

impl MarketType {
    /// Short lowercase label used in cache keys.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Spot => "spot",
            Self::UmFutures => "um",
            Self::CmFutures => "cm",
        }
    }

    /// Path segment in the archive tree and the cache mirror of it.
    #[must_use]
    pub const fn path_segment(self) -> &'static str {
        match self {
            Self::Spot => "spot",
            Self::UmFutures => "futures/um",
            Self::CmFutures => "futures/cm",
        }
    }

    /// Symbol as it appears in storage paths for this market.
    ///
    /// Coin-margined instruments carry a settlement suffix in the archive
    /// tree (`BTCUSD` is stored as `BTCUSD_PERP`).
    #[must_use]
    pub fn symbol_variant(self, symbol: &str) -> String {
        match self {
            Self::Spot | Self::UmFutures => symbol.to_string(),
            Self::CmFutures => {
                if symbol.contains('_') {
                    symbol.to_string()
                } else {
                    format!("{symbol}_PERP")
                }
            }
        }
    }

    /// Whether this market publishes bars at the given interval.
    ///
    /// Sub-minute bars exist on spot only.
    #[must_use]
    pub const fn supports_interval(self, interval: Interval) -> bool {
        match self {
            Self::Spot => true,
            Self::UmFutures | Self::CmFutures => !matches!(interval, Interval::I1s),
        }
    }

    /// Whether this market settles funding (perpetual futures do, spot does not).
    #[must_use]
    pub const fn has_funding(self) -> bool {
        matches!(self, Self::UmFutures | Self::CmFutures)
    }
}

impl fmt::Display for MarketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MarketType {
    type Err = CandelaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "spot" => Ok(Self::Spot),
            "um" => Ok(Self::UmFutures),
            "cm" => Ok(Self::CmFutures),
            other => Err(CandelaError::validation(format!(
                "unknown market type '{other}'"
            ))),
        }
    }
}

/// Kind of series a cache entry holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChartType {
    /// OHLCV candle series.
    Klines,
    /// Funding-rate settlement series.
    FundingRate,
}

impl ChartType {
    /// Path segment used in the archive tree and cache layout.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Klines => "klines",
            Self::FundingRate => "fundingRate",
        }
    }
}

impl fmt::Display for ChartType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChartType {
    type Err = CandelaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "klines" => Ok(Self::Klines),
            "fundingRate" => Ok(Self::FundingRate),
            other => Err(CandelaError::validation(format!(
                "unknown chart type '{other}'"
            ))),
        }
    }
}
