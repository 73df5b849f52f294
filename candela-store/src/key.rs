//! Deterministic cache addressing.
//!
//! A [`CacheKey`] pins down exactly one stored file: one provider, one chart
//! type, one market, one symbol, one interval, one UTC calendar day. Key
//! derivation normalizes case up front so that lookups never depend on how a
//! caller happened to spell a symbol, and path derivation is a pure function
//! of the key, which makes cache locations reproducible across runs and
//! hosts.

use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use candela_core::types::{ChartType, Interval, MarketType};

/// Identity of one cached day file.
///
/// Two keys derived from the same logical coordinates compare equal even if
/// the original inputs differed in case or padding; [`CacheKey::derive`] is
/// the only constructor that performs that normalization, so prefer it over
/// struct literals outside of tests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    /// Upstream provider label, uppercased (e.g. `"BINANCE"`).
    pub provider: String,
    /// Kind of series the file holds.
    pub chart_type: ChartType,
    /// Market family the symbol trades on.
    pub market_type: MarketType,
    /// Instrument symbol, uppercased, without market-specific suffixes.
    pub symbol: String,
    /// Bar interval of the stored series.
    pub interval: Interval,
    /// UTC calendar day the file covers.
    pub date: NaiveDate,
}

impl CacheKey {
    /// Derive a normalized key from request coordinates.
    ///
    /// `provider` and `symbol` are trimmed and uppercased; the enums carry
    /// their own canonical spelling. Callers holding an instant rather than
    /// a day truncate with `instant.date_naive()` first, because cache
    /// granularity is one file per day and never partial-day.
    #[must_use]
    pub fn derive(
        provider: &str,
        chart_type: ChartType,
        market_type: MarketType,
        symbol: &str,
        interval: Interval,
        date: NaiveDate,
    ) -> Self {
        Self {
            provider: provider.trim().to_ascii_uppercase(),
            chart_type,
            market_type,
            symbol: symbol.trim().to_ascii_uppercase(),
            interval,
            date,
        }
    }

    /// The same key pointed at a different day.
    ///
    /// Day iteration over a multi-day request derives one key and steps the
    /// date, keeping the normalized components intact.
    #[must_use]
    pub fn with_date(&self, date: NaiveDate) -> Self {
        Self {
            date,
            ..self.clone()
        }
    }

    /// Symbol as it appears in storage paths for this key's market.
    #[must_use]
    pub fn symbol_variant(&self) -> String {
        self.market_type.symbol_variant(&self.symbol)
    }

    /// File name for this key, `<SYMBOL>-<interval>-<YYYY-MM-DD>.parquet`.
    #[must_use]
    pub fn file_name(&self) -> String {
        format!(
            "{}-{}-{}.parquet",
            self.symbol_variant(),
            self.interval.as_str(),
            self.date.format("%Y-%m-%d"),
        )
    }

    /// Relative storage location rendered with forward slashes.
    ///
    /// The layout mirrors the upstream archive tree so a cache path and an
    /// archive URL differ only in their roots:
    ///
    /// ```text
    /// <PROVIDER>/<chartType>/<marketPath>/daily/<chartType>/<variant>/<interval>/<file>
    /// ```
    ///
    /// This string doubles as the entry's identity in the store index, which
    /// is why it stays platform-independent rather than using native
    /// separators.
    #[must_use]
    pub fn index_key(&self) -> String {
        let chart = self.chart_type.as_str();
        format!(
            "{provider}/{chart}/{market}/daily/{chart}/{variant}/{interval}/{file}",
            provider = self.provider,
            market = self.market_type.path_segment(),
            variant = self.symbol_variant(),
            interval = self.interval.as_str(),
            file = self.file_name(),
        )
    }

    /// [`CacheKey::index_key`] as a relative filesystem path.
    #[must_use]
    pub fn relative_path(&self) -> PathBuf {
        PathBuf::from(self.index_key())
    }
}
