//! Live REST connector for klines and funding-rate settlements.
//!
//! One base URL per market (`api`, `fapi`, `dapi`), pages of up to 1000 rows,
//! and a cursor that advances past the last returned open time. Binance's
//! `endTime` is inclusive, so the half-open request range is narrowed by one
//! millisecond before it goes on the wire.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use candela_core::connector::{
    CandelaConnector, ConnectorKey, FundingRateProvider, KlineProvider,
};
use candela_core::types::{
    Candle, CandelaError, Capability, DataSource, FundingRate, Interval, MarketType, TimeRange,
};

use crate::http;

const SPOT_BASE: &str = "https://api.binance.com";
const UM_BASE: &str = "https://fapi.binance.com";
const CM_BASE: &str = "https://dapi.binance.com";

const NAME: &str = "candela-binance-live";

/// Rows per REST page; the documented maximum for both endpoints.
const PAGE_LIMIT: usize = 1000;

/// Connector for the Binance REST API.
///
/// Construct via [`BinanceLive::builder`]; the builder accepts per-market
/// base-URL overrides for tests, an injected `reqwest::Client`, and a
/// per-request timeout. Each call is single-shot (retry and backoff are the
/// orchestrator's job) and the HTTP client is released on drop.
#[derive(Debug, Clone)]
pub struct BinanceLive {
    client: reqwest::Client,
    spot_base: String,
    um_base: String,
    cm_base: String,
    timeout: Duration,
}

/// Builder for [`BinanceLive`].
#[derive(Debug, Clone)]
pub struct BinanceLiveBuilder {
    spot_base: String,
    um_base: String,
    cm_base: String,
    client: Option<reqwest::Client>,
    timeout: Duration,
}

impl Default for BinanceLiveBuilder {
    fn default() -> Self {
        Self {
            spot_base: SPOT_BASE.to_string(),
            um_base: UM_BASE.to_string(),
            cm_base: CM_BASE.to_string(),
            client: None,
            timeout: http::DEFAULT_TIMEOUT,
        }
    }
}

impl BinanceLiveBuilder {
    /// Override the spot host (`api.binance.com`).
    #[must_use]
    pub fn spot_base(mut self, base: impl Into<String>) -> Self {
        self.spot_base = base.into();
        self
    }

    /// Override the USDⓈ-margined futures host (`fapi.binance.com`).
    #[must_use]
    pub fn um_base(mut self, base: impl Into<String>) -> Self {
        self.um_base = base.into();
        self
    }

    /// Override the coin-margined futures host (`dapi.binance.com`).
    #[must_use]
    pub fn cm_base(mut self, base: impl Into<String>) -> Self {
        self.cm_base = base.into();
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

    /// Finish the builder.
    #[must_use]
    pub fn build(self) -> BinanceLive {
        BinanceLive {
            client: self.client.unwrap_or_default(),
            spot_base: self.spot_base.trim_end_matches('/').to_string(),
            um_base: self.um_base.trim_end_matches('/').to_string(),
            cm_base: self.cm_base.trim_end_matches('/').to_string(),
            timeout: self.timeout,
        }
    }
}

impl Default for BinanceLive {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl BinanceLive {
    /// Static connector key for orchestrator tier configuration.
    pub const KEY: ConnectorKey = ConnectorKey::new(NAME);

    /// Connector with default transport against the public REST hosts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start building a customized connector.
    #[must_use]
    pub fn builder() -> BinanceLiveBuilder {
        BinanceLiveBuilder::default()
    }

    fn kline_url(&self, market: MarketType) -> String {
        match market {
            MarketType::Spot => format!("{}/api/v3/klines", self.spot_base),
            MarketType::UmFutures => format!("{}/fapi/v1/klines", self.um_base),
            MarketType::CmFutures => format!("{}/dapi/v1/klines", self.cm_base),
        }
    }

    fn funding_url(&self, market: MarketType) -> Option<String> {
        match market {
            MarketType::Spot => None,
            MarketType::UmFutures => Some(format!("{}/fapi/v1/fundingRate", self.um_base)),
            MarketType::CmFutures => Some(format!("{}/dapi/v1/fundingRate", self.cm_base)),
        }
    }

    async fn page<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        symbol: &str,
        interval: Option<Interval>,
        start_ms: i64,
        end_ms: i64,
        what: &str,
    ) -> Result<Vec<T>, CandelaError> {
        let start_s = start_ms.to_string();
        let end_s = end_ms.to_string();
        let limit_s = PAGE_LIMIT.to_string();
        let mut params = vec![
            ("symbol", symbol),
            ("startTime", start_s.as_str()),
            ("endTime", end_s.as_str()),
            ("limit", limit_s.as_str()),
        ];
        if let Some(interval) = interval {
            params.insert(1, ("interval", interval.as_str()));
        }
        let request = self.client.get(url).query(&params);
        let body = http::fetch_bytes(request, self.timeout, NAME, what).await?;
        serde_json::from_slice(&body)
            .map_err(|err| CandelaError::Data(format!("{what}: response decode: {err}")))
    }
}

/// One kline row as the REST API ships it: a 12-element JSON array with
/// string-encoded decimals and a legacy trailing field.
#[derive(Debug, Deserialize)]
struct RawKline(
    i64,               // open time (ms)
    String,            // open
    String,            // high
    String,            // low
    String,            // close
    String,            // base volume
    i64,               // close time (ms)
    String,            // quote volume
    u64,               // trade count
    String,            // taker buy base volume
    String,            // taker buy quote volume
    serde_json::Value, // unused legacy field
);

impl RawKline {
    fn into_candle(self, what: &str) -> Result<Candle, CandelaError> {
        Ok(Candle {
            open_time: from_millis(self.0, what)?,
            close_time: from_millis(self.6, what)?,
            open: decimal(&self.1, what)?,
            high: decimal(&self.2, what)?,
            low: decimal(&self.3, what)?,
            close: decimal(&self.4, what)?,
            volume: decimal(&self.5, what)?,
            quote_volume: decimal(&self.7, what)?,
            trade_count: self.8,
            taker_buy_base: decimal(&self.9, what)?,
            taker_buy_quote: decimal(&self.10, what)?,
            source: DataSource::Live,
        })
    }
}

/// One funding settlement as the REST API ships it. `markPrice` arrives
/// empty or absent on older rows.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFunding {
    funding_time: i64,
    funding_rate: String,
    #[serde(default)]
    mark_price: Option<String>,
}

impl RawFunding {
    fn into_rate(self, what: &str) -> Result<FundingRate, CandelaError> {
        Ok(FundingRate {
            funding_time: from_millis(self.funding_time, what)?,
            funding_rate: decimal(&self.funding_rate, what)?,
            mark_price: self.mark_price.as_deref().and_then(|s| s.parse().ok()),
            source: DataSource::Live,
        })
    }
}

#[async_trait]
impl KlineProvider for BinanceLive {
    async fn klines(
        &self,
        symbol: &str,
        market: MarketType,
        interval: Interval,
        range: TimeRange,
    ) -> Result<Vec<Candle>, CandelaError> {
        if !market.supports_interval(interval) {
            return Err(CandelaError::validation(format!(
                "interval {interval} is not served for {market} markets"
            )));
        }
        let variant = market.symbol_variant(&symbol.trim().to_ascii_uppercase());
        let url = self.kline_url(market);
        let what = format!("klines for {variant} {interval}");
        let end_ms = range.end.timestamp_millis() - 1;
        let mut cursor = range.start.timestamp_millis();
        let mut out = Vec::new();

        while cursor <= end_ms {
            let batch: Vec<RawKline> = self
                .page(&url, &variant, Some(interval), cursor, end_ms, &what)
                .await?;
            if batch.is_empty() {
                break;
            }
            let count = batch.len();
            let last_open_ms = batch.last().map_or(cursor, |k| k.0);
            #[cfg(feature = "tracing")]
            tracing::debug!(symbol = variant.as_str(), rows = count, cursor, "kline page");
            for raw in batch {
                let candle = raw.into_candle(&what)?;
                if range.contains(candle.open_time) {
                    out.push(candle);
                }
            }
            // A cursor that fails to move means the server is replaying the
            // same bar; bail instead of spinning.
            if last_open_ms < cursor {
                break;
            }
            cursor = last_open_ms + 1;
            if count < PAGE_LIMIT {
                break;
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl FundingRateProvider for BinanceLive {
    async fn funding_rates(
        &self,
        symbol: &str,
        market: MarketType,
        range: TimeRange,
    ) -> Result<Vec<FundingRate>, CandelaError> {
        let Some(url) = self.funding_url(market) else {
            return Err(CandelaError::unsupported(Capability::FundingRates.as_str()));
        };
        let variant = market.symbol_variant(&symbol.trim().to_ascii_uppercase());
        let what = format!("funding rates for {variant}");
        let end_ms = range.end.timestamp_millis() - 1;
        let mut cursor = range.start.timestamp_millis();
        let mut out = Vec::new();

        while cursor <= end_ms {
            let batch: Vec<RawFunding> = self
                .page(&url, &variant, None, cursor, end_ms, &what)
                .await?;
            if batch.is_empty() {
                break;
            }
            let count = batch.len();
            let last_time_ms = batch.last().map_or(cursor, |r| r.funding_time);
            for raw in batch {
                let rate = raw.into_rate(&what)?;
                if range.contains(rate.funding_time) {
                    out.push(rate);
                }
            }
            if last_time_ms < cursor {
                break;
            }
            cursor = last_time_ms + 1;
            if count < PAGE_LIMIT {
                break;
            }
        }
        Ok(out)
    }
}

impl CandelaConnector for BinanceLive {
    fn name(&self) -> &'static str {
        NAME
    }

    fn vendor(&self) -> &'static str {
        "Binance"
    }

    fn source(&self) -> DataSource {
        DataSource::Live
    }

    fn supports_market(&self, _market: MarketType) -> bool {
        true
    }

    fn as_kline_provider(&self) -> Option<&dyn KlineProvider> {
        Some(self)
    }

    fn as_funding_rate_provider(&self) -> Option<&dyn FundingRateProvider> {
        Some(self)
    }
}

fn from_millis(raw: i64, what: &str) -> Result<DateTime<Utc>, CandelaError> {
    DateTime::from_timestamp_millis(raw)
        .ok_or_else(|| CandelaError::Data(format!("{what}: timestamp {raw} out of range")))
}

fn decimal(s: &str, what: &str) -> Result<f64, CandelaError> {
    s.trim()
        .parse::<f64>()
        .map_err(|err| CandelaError::Data(format!("{what}: decimal {s:?}: {err}")))
}
