//! Day-sharded bulk archive connector.
//!
//! Binance publishes every finished UTC day as a single-entry ZIP at
//! `data.binance.vision`, next to a `.CHECKSUM` sidecar. This connector
//! downloads one day at a time, applies the checksum policy, and decodes the
//! CSV into candles. Days that end inside the freshness window are reported
//! unavailable instead of fetched: the bulk pipeline trails real time, and a
//! round trip for a day that cannot exist yet is a guaranteed miss.

use std::io::{Cursor, Read};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use csv::{ReaderBuilder, StringRecord};
use zip::ZipArchive;

use candela_core::checksum::{self, ChecksumRecord};
use candela_core::connector::{ArchiveDayProvider, CandelaConnector, ConnectorKey, KlineProvider};
use candela_core::timeseries::align::{datetime_from_raw, detect_timestamp_unit};
use candela_core::types::{
    ArchiveDay, Candle, CandelaError, DataSource, Interval, MarketType, TimeRange, TimestampUnit,
};

use crate::http;

/// Public bulk-archive host.
const VISION_BASE: &str = "https://data.binance.vision";

const NAME: &str = "candela-binance-archive";

/// Connector for the Binance bulk archive (`data.binance.vision`).
///
/// Construct via [`BinanceArchive::builder`]; the builder accepts a base-URL
/// override for tests, an injected `reqwest::Client`, a per-request timeout,
/// and the freshness window that gates both availability and checksum
/// severity. The HTTP client is released when the connector drops.
#[derive(Debug, Clone)]
pub struct BinanceArchive {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    freshness_window: Duration,
}

/// Builder for [`BinanceArchive`].
#[derive(Debug, Clone)]
pub struct BinanceArchiveBuilder {
    base_url: String,
    client: Option<reqwest::Client>,
    timeout: Duration,
    freshness_window: Duration,
}

impl Default for BinanceArchiveBuilder {
    fn default() -> Self {
        Self {
            base_url: VISION_BASE.to_string(),
            client: None,
            timeout: http::DEFAULT_TIMEOUT,
            freshness_window: Duration::from_secs(48 * 3_600),
        }
    }
}

impl BinanceArchiveBuilder {
    /// Override the archive host, e.g. to point at a local mock server.
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Use an existing `reqwest::Client` instead of constructing one.
    #[must_use]
    pub fn client(mut self, client: reqwest::Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Per-request timeout, headers through body. Defaults to 30s.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// How far the archive is assumed to trail real time. Defaults to 48h.
    ///
    /// Days ending inside this window are unavailable, and checksum failures
    /// inside it downgrade to warnings instead of hard integrity faults.
    #[must_use]
    pub fn freshness_window(mut self, window: Duration) -> Self {
        self.freshness_window = window;
        self
    }

    /// Finish the builder.
    #[must_use]
    pub fn build(self) -> BinanceArchive {
        BinanceArchive {
            client: self.client.unwrap_or_default(),
            base_url: self.base_url.trim_end_matches('/').to_string(),
            timeout: self.timeout,
            freshness_window: self.freshness_window,
        }
    }
}

impl Default for BinanceArchive {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl BinanceArchive {
    /// Static connector key for orchestrator tier configuration.
    pub const KEY: ConnectorKey = ConnectorKey::new(NAME);

    /// Connector with default transport against the public archive host.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start building a customized connector.
    #[must_use]
    pub fn builder() -> BinanceArchiveBuilder {
        BinanceArchiveBuilder::default()
    }

    fn payload_url(
        &self,
        variant: &str,
        market: MarketType,
        interval: Interval,
        date: NaiveDate,
    ) -> String {
        format!(
            "{}/data/{}/daily/klines/{variant}/{interval}/{variant}-{interval}-{date}.zip",
            self.base_url,
            market.path_segment(),
        )
    }

    /// Whether `date`'s final bar closed recently enough that the bulk
    /// pipeline may not have published the day yet.
    fn day_inside_window(&self, date: NaiveDate, now: DateTime<Utc>) -> bool {
        let Some(end) = day_end_utc(date) else {
            return true;
        };
        let window_secs = i64::try_from(self.freshness_window.as_secs()).unwrap_or(i64::MAX);
        (now - end).num_seconds() < window_secs
    }

    async fn checksum_record(
        &self,
        url: &str,
        payload: &[u8],
        what: &str,
    ) -> Result<ChecksumRecord, CandelaError> {
        let sidecar_url = format!("{url}.CHECKSUM");
        let sidecar_what = format!("checksum sidecar for {what}");
        let sidecar = http::fetch_bytes(
            self.client.get(&sidecar_url),
            self.timeout,
            NAME,
            &sidecar_what,
        )
        .await?;
        let expected = checksum::extract_expected_hash(&sidecar)?;
        Ok(checksum::verify(payload, &expected, url))
    }
}

#[async_trait]
impl ArchiveDayProvider for BinanceArchive {
    async fn fetch_day(
        &self,
        symbol: &str,
        market: MarketType,
        interval: Interval,
        date: NaiveDate,
    ) -> Result<ArchiveDay, CandelaError> {
        if !market.supports_interval(interval) {
            return Err(CandelaError::validation(format!(
                "interval {interval} is not published for {market} markets"
            )));
        }
        let variant = market.symbol_variant(&symbol.trim().to_ascii_uppercase());
        let url = self.payload_url(&variant, market, interval, date);
        let what = format!("archive day {date} for {variant} {interval}");

        let payload =
            http::fetch_bytes(self.client.get(&url), self.timeout, NAME, &what).await?;
        #[cfg(feature = "tracing")]
        tracing::debug!(url = url.as_str(), bytes = payload.len(), "fetched archive day");

        // Severity of an integrity failure depends on whether the day could
        // still be settling: inside the window the payload stays usable (but
        // unverified, so never persisted); outside it the failure is hard.
        let inside_window = self.day_inside_window(date, Utc::now());
        let (verified, warning) = match self.checksum_record(&url, &payload, &what).await {
            Ok(record) if record.verified => (true, None),
            Ok(record) if inside_window => (
                false,
                Some(format!(
                    "checksum mismatch for {url}: expected {}, got {}",
                    record.expected_hash, record.actual_hash
                )),
            ),
            Ok(record) => {
                return Err(CandelaError::Integrity {
                    path: url,
                    expected: record.expected_hash,
                    actual: record.actual_hash,
                });
            }
            Err(err) if inside_window => {
                #[cfg(feature = "tracing")]
                tracing::warn!(url = url.as_str(), error = %err, "archive day unverifiable");
                (false, Some(format!("integrity unverifiable: {err}")))
            }
            Err(err) => return Err(err),
        };

        let candles = decode_day_zip(&payload, &what)?;
        Ok(ArchiveDay {
            date,
            candles,
            verified,
            warning,
        })
    }

    fn day_available(&self, date: NaiveDate) -> bool {
        !self.day_inside_window(date, Utc::now())
    }
}

#[async_trait]
impl KlineProvider for BinanceArchive {
    async fn klines(
        &self,
        symbol: &str,
        market: MarketType,
        interval: Interval,
        range: TimeRange,
    ) -> Result<Vec<Candle>, CandelaError> {
        let mut out = Vec::new();
        let mut day = range.start.date_naive();
        let last = (range.end - chrono::Duration::microseconds(1)).date_naive();
        while day <= last {
            if self.day_available(day) {
                match self.fetch_day(symbol, market, interval, day).await {
                    Ok(published) => out.extend(
                        published
                            .candles
                            .into_iter()
                            .filter(|c| range.contains(c.open_time)),
                    ),
                    // An unpublished day is absence, not failure.
                    Err(CandelaError::NotFound { .. }) => {}
                    Err(err) => return Err(err),
                }
            }
            match day.succ_opt() {
                Some(next) => day = next,
                None => break,
            }
        }
        Ok(out)
    }

    async fn is_available(&self, range: TimeRange) -> bool {
        // The range's first day is its oldest; if even that one is still
        // settling, the archive holds nothing for the request.
        self.day_available(range.start.date_naive())
    }
}

impl CandelaConnector for BinanceArchive {
    fn name(&self) -> &'static str {
        NAME
    }

    fn vendor(&self) -> &'static str {
        "Binance"
    }

    fn source(&self) -> DataSource {
        DataSource::Archive
    }

    fn supports_market(&self, _market: MarketType) -> bool {
        true
    }

    fn as_kline_provider(&self) -> Option<&dyn KlineProvider> {
        Some(self)
    }

    // No funding capability: the archive shards funding monthly, which does
    // not fit the day-granular model this connector serves.

    fn as_archive_provider(&self) -> Option<&dyn ArchiveDayProvider> {
        Some(self)
    }
}

fn day_end_utc(date: NaiveDate) -> Option<DateTime<Utc>> {
    let midnight = date.succ_opt()?.and_hms_opt(0, 0, 0)?;
    Some(Utc.from_utc_datetime(&midnight))
}

fn decode_day_zip(payload: &[u8], what: &str) -> Result<Vec<Candle>, CandelaError> {
    let mut zip = ZipArchive::new(Cursor::new(payload))
        .map_err(|err| CandelaError::Data(format!("{what}: unreadable zip: {err}")))?;
    if zip.is_empty() {
        return Err(CandelaError::Data(format!("{what}: zip holds no entries")));
    }
    // Archive days hold exactly one CSV entry.
    let mut entry = zip
        .by_index(0)
        .map_err(|err| CandelaError::Data(format!("{what}: zip entry: {err}")))?;
    let mut text = String::with_capacity(usize::try_from(entry.size()).unwrap_or(0));
    entry
        .read_to_string(&mut text)
        .map_err(|err| CandelaError::Data(format!("{what}: zip entry read: {err}")))?;
    decode_rows(&text, what)
}

fn decode_rows(text: &str, what: &str) -> Result<Vec<Candle>, CandelaError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    // The archive switched timestamp precision at a calendar point, so the
    // unit is re-detected from the first data row of every file.
    let mut unit: Option<TimestampUnit> = None;
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|err| CandelaError::Data(format!("{what}: csv: {err}")))?;
        let raw_open = match field(&record, 0, what)?.parse::<i64>() {
            Ok(v) => v,
            // Some exports lead with a header row; anything unparsable after
            // data has started is corruption.
            Err(_) if unit.is_none() => continue,
            Err(err) => {
                return Err(CandelaError::Data(format!("{what}: open_time: {err}")));
            }
        };
        let row_unit = match unit {
            Some(u) => u,
            None => {
                let detected = detect_timestamp_unit(raw_open)?;
                unit = Some(detected);
                detected
            }
        };
        rows.push(Candle {
            open_time: datetime_from_raw(raw_open, row_unit)?,
            close_time: datetime_from_raw(parse_i64(&record, 6, what)?, row_unit)?,
            open: parse_f64(&record, 1, what)?,
            high: parse_f64(&record, 2, what)?,
            low: parse_f64(&record, 3, what)?,
            close: parse_f64(&record, 4, what)?,
            volume: parse_f64(&record, 5, what)?,
            quote_volume: parse_f64(&record, 7, what)?,
            trade_count: parse_u64(&record, 8, what)?,
            taker_buy_base: parse_f64(&record, 9, what)?,
            taker_buy_quote: parse_f64(&record, 10, what)?,
            source: DataSource::Archive,
        });
    }
    rows.sort_by_key(|c| c.open_time);
    Ok(rows)
}

fn field<'r>(record: &'r StringRecord, idx: usize, what: &str) -> Result<&'r str, CandelaError> {
    record
        .get(idx)
        .ok_or_else(|| CandelaError::Data(format!("{what}: row is missing column {idx}")))
}

fn parse_f64(record: &StringRecord, idx: usize, what: &str) -> Result<f64, CandelaError> {
    field(record, idx, what)?
        .trim()
        .parse::<f64>()
        .map_err(|err| CandelaError::Data(format!("{what}: column {idx}: {err}")))
}

fn parse_i64(record: &StringRecord, idx: usize, what: &str) -> Result<i64, CandelaError> {
    field(record, idx, what)?
        .trim()
        .parse::<i64>()
        .map_err(|err| CandelaError::Data(format!("{what}: column {idx}: {err}")))
}

fn parse_u64(record: &StringRecord, idx: usize, what: &str) -> Result<u64, CandelaError> {
    field(record, idx, what)?
        .trim()
        .parse::<u64>()
        .map_err(|err| CandelaError::Data(format!("{what}: column {idx}: {err}")))
}
