//! Connector adapter over a shared [`ParquetStore`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;

use candela_core::connector::{CandelaConnector, FundingRateProvider, KlineProvider};
use candela_core::types::{
    Candle, CandelaError, Capability, ChartType, DataSource, FundingRate, Interval, MarketType,
    TimeRange,
};

use crate::key::CacheKey;
use crate::store::ParquetStore;

/// Read adapter presenting a [`ParquetStore`] as a fallback-chain source.
///
/// The connector surface is read-only: writes stay on [`ParquetStore`]
/// directly, so the orchestrator can treat the cache exactly like a remote
/// source during lookup while keeping persistence decisions to itself. Days
/// with no usable file simply contribute no rows; partial coverage is the
/// caller's problem to detect.
#[derive(Debug)]
pub struct CacheConnector {
    store: Arc<ParquetStore>,
    provider: String,
}

impl CacheConnector {
    /// Wrap a shared store, scoping lookups to `provider`'s key space.
    #[must_use]
    pub fn new(store: Arc<ParquetStore>, provider: impl Into<String>) -> Self {
        Self {
            store,
            provider: provider.into(),
        }
    }

    /// The wrapped store.
    #[must_use]
    pub fn store(&self) -> &Arc<ParquetStore> {
        &self.store
    }

    /// Provider label scoping this connector's key space.
    ///
    /// Writers persisting freshly fetched rows derive their keys with this
    /// label so later lookups through the connector find them.
    #[must_use]
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// UTC days touched by the half-open `range`, in order.
    fn days_covering(range: TimeRange) -> Vec<NaiveDate> {
        let last = (range.end - chrono::Duration::microseconds(1)).date_naive();
        let mut day = range.start.date_naive();
        let mut days = Vec::new();
        while day <= last {
            days.push(day);
            match day.succ_opt() {
                Some(next) => day = next,
                None => break,
            }
        }
        days
    }
}

impl CandelaConnector for CacheConnector {
    fn name(&self) -> &'static str {
        "candela-cache"
    }

    fn vendor(&self) -> &'static str {
        "local"
    }

    fn source(&self) -> DataSource {
        DataSource::Cache
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

#[async_trait]
impl KlineProvider for CacheConnector {
    async fn klines(
        &self,
        symbol: &str,
        market: MarketType,
        interval: Interval,
        range: TimeRange,
    ) -> Result<Vec<Candle>, CandelaError> {
        let base = CacheKey::derive(
            &self.provider,
            ChartType::Klines,
            market,
            symbol,
            interval,
            range.start.date_naive(),
        );
        let mut out = Vec::new();
        for day in Self::days_covering(range) {
            let key = base.with_date(day);
            if let Some(rows) = self.store.load(&key)? {
                out.extend(rows.into_iter().filter(|c| range.contains(c.open_time)));
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl FundingRateProvider for CacheConnector {
    async fn funding_rates(
        &self,
        symbol: &str,
        market: MarketType,
        range: TimeRange,
    ) -> Result<Vec<FundingRate>, CandelaError> {
        if !market.has_funding() {
            return Err(CandelaError::unsupported(Capability::FundingRates.as_str()));
        }
        let base = CacheKey::derive(
            &self.provider,
            ChartType::FundingRate,
            market,
            symbol,
            Interval::I8h,
            range.start.date_naive(),
        );
        let mut out = Vec::new();
        for day in Self::days_covering(range) {
            let key = base.with_date(day);
            if let Some(rows) = self.store.load_funding(&key)? {
                out.extend(rows.into_iter().filter(|r| range.contains(r.funding_time)));
            }
        }
        Ok(out)
    }
}
