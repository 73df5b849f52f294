use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::Mutex;

use candela_core::connector::{
    ArchiveDayProvider, CandelaConnector, FundingRateProvider, KlineProvider,
};
use candela_core::{
    ArchiveDay, Candle, CandelaError, DataSource, FundingRate, Interval, MarketType, TimeRange,
};

/// Instruction for how a method should behave for a given input.
#[derive(Clone)]
pub enum MockBehavior<T> {
    /// Return the provided value immediately.
    Return(T),
    /// Fail immediately with the provided error.
    Fail(CandelaError),
    /// Fail the first call with the provided error, then return the value on
    /// every later call. Lets tests exercise retry paths.
    FailOnce(CandelaError, T),
    /// Hang indefinitely (simulate a stalled upstream).
    Hang,
}

#[derive(Default)]
struct InternalState {
    kline_rules: HashMap<String, MockBehavior<Vec<Candle>>>,
    funding_rules: HashMap<String, MockBehavior<Vec<FundingRate>>>,
    archive_rules: HashMap<(String, NaiveDate), MockBehavior<ArchiveDay>>,
    kline_requests: Vec<(String, TimeRange)>,
    funding_requests: Vec<(String, TimeRange)>,
    archive_requests: Vec<(String, NaiveDate)>,
}

/// Snapshot the behavior for `key`, downgrading `FailOnce` to `Return` so the
/// next call sees the success half.
fn resolve<K, T>(rules: &mut HashMap<K, MockBehavior<T>>, key: &K) -> Option<MockBehavior<T>>
where
    K: Hash + Eq + Clone,
    T: Clone,
{
    match rules.get(key).cloned() {
        Some(MockBehavior::FailOnce(err, value)) => {
            rules.insert(key.clone(), MockBehavior::Return(value));
            Some(MockBehavior::Fail(err))
        }
        other => other,
    }
}

/// Controller handle used by tests to drive the dynamic mock from the outside.
pub struct DynamicMockController {
    state: Arc<Mutex<InternalState>>,
}

impl DynamicMockController {
    /// Set the behavior for `klines` calls for a specific symbol.
    pub async fn set_kline_behavior(
        &self,
        symbol: impl Into<String>,
        behavior: MockBehavior<Vec<Candle>>,
    ) {
        let mut guard = self.state.lock().await;
        guard.kline_rules.insert(symbol.into(), behavior);
    }

    /// Set the behavior for `funding_rates` calls for a specific symbol.
    pub async fn set_funding_behavior(
        &self,
        symbol: impl Into<String>,
        behavior: MockBehavior<Vec<FundingRate>>,
    ) {
        let mut guard = self.state.lock().await;
        guard.funding_rules.insert(symbol.into(), behavior);
    }

    /// Set the behavior for `fetch_day` calls for a specific symbol and day.
    pub async fn set_archive_behavior(
        &self,
        symbol: impl Into<String>,
        date: NaiveDate,
        behavior: MockBehavior<ArchiveDay>,
    ) {
        let mut guard = self.state.lock().await;
        guard.archive_rules.insert((symbol.into(), date), behavior);
    }

    /// Return a copy of the kline request log: one `(symbol, range)` per call.
    pub async fn kline_requests(&self) -> Vec<(String, TimeRange)> {
        let guard = self.state.lock().await;
        guard.kline_requests.clone()
    }

    /// Return a copy of the funding request log.
    pub async fn funding_requests(&self) -> Vec<(String, TimeRange)> {
        let guard = self.state.lock().await;
        guard.funding_requests.clone()
    }

    /// Return a copy of the archive request log: one `(symbol, date)` per call.
    pub async fn archive_requests(&self) -> Vec<(String, NaiveDate)> {
        let guard = self.state.lock().await;
        guard.archive_requests.clone()
    }

    /// Clear all configured behaviors and request logs.
    pub async fn clear_all_behaviors(&self) {
        let mut guard = self.state.lock().await;
        guard.kline_rules.clear();
        guard.funding_rules.clear();
        guard.archive_rules.clear();
        guard.kline_requests.clear();
        guard.funding_requests.clear();
        guard.archive_requests.clear();
    }
}

/// A connector that defers all behavior to an external controller.
pub struct DynamicMockConnector {
    name: &'static str,
    source: DataSource,
    state: Arc<Mutex<InternalState>>,
}

impl DynamicMockConnector {
    /// Create a new dynamic mock connector and its controller.
    #[must_use]
    pub fn new_with_controller(
        name: &'static str,
        source: DataSource,
    ) -> (Arc<dyn CandelaConnector>, DynamicMockController) {
        let state = Arc::new(Mutex::new(InternalState::default()));
        let controller = DynamicMockController {
            state: Arc::clone(&state),
        };
        let me = Arc::new(Self {
            name,
            source,
            state,
        });
        (me as Arc<dyn CandelaConnector>, controller)
    }
}

impl CandelaConnector for DynamicMockConnector {
    fn name(&self) -> &'static str {
        self.name
    }

    fn vendor(&self) -> &'static str {
        "DynamicMock"
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
impl KlineProvider for DynamicMockConnector {
    async fn klines(
        &self,
        symbol: &str,
        _market: MarketType,
        _interval: Interval,
        range: TimeRange,
    ) -> Result<Vec<Candle>, CandelaError> {
        let key = symbol.to_string();
        // Log the request and snapshot the behavior without holding the lock
        // across await points
        let behavior = {
            let mut guard = self.state.lock().await;
            guard.kline_requests.push((key.clone(), range));
            resolve(&mut guard.kline_rules, &key)
        };

        match behavior {
            Some(MockBehavior::Return(rows)) => Ok(rows),
            Some(MockBehavior::Fail(e) | MockBehavior::FailOnce(e, _)) => Err(e),
            Some(MockBehavior::Hang) => {
                std::future::pending::<()>().await;
                unreachable!()
            }
            None => Err(CandelaError::unsupported("klines")),
        }
    }
}

#[async_trait]
impl FundingRateProvider for DynamicMockConnector {
    async fn funding_rates(
        &self,
        symbol: &str,
        _market: MarketType,
        range: TimeRange,
    ) -> Result<Vec<FundingRate>, CandelaError> {
        let key = symbol.to_string();
        let behavior = {
            let mut guard = self.state.lock().await;
            guard.funding_requests.push((key.clone(), range));
            resolve(&mut guard.funding_rules, &key)
        };

        match behavior {
            Some(MockBehavior::Return(rows)) => Ok(rows),
            Some(MockBehavior::Fail(e) | MockBehavior::FailOnce(e, _)) => Err(e),
            Some(MockBehavior::Hang) => {
                std::future::pending::<()>().await;
                unreachable!()
            }
            None => Err(CandelaError::unsupported("funding-rates")),
        }
    }
}

#[async_trait]
impl ArchiveDayProvider for DynamicMockConnector {
    async fn fetch_day(
        &self,
        symbol: &str,
        _market: MarketType,
        _interval: Interval,
        date: NaiveDate,
    ) -> Result<ArchiveDay, CandelaError> {
        let key = (symbol.to_string(), date);
        let behavior = {
            let mut guard = self.state.lock().await;
            guard.archive_requests.push(key.clone());
            resolve(&mut guard.archive_rules, &key)
        };

        match behavior {
            Some(MockBehavior::Return(day)) => Ok(day),
            Some(MockBehavior::Fail(e) | MockBehavior::FailOnce(e, _)) => Err(e),
            Some(MockBehavior::Hang) => {
                std::future::pending::<()>().await;
                unreachable!()
            }
            // An unscripted day reads as unpublished, so multi-day scripts
            // only need to cover the days they care about
            None => Err(CandelaError::not_found(format!("archive day {date}"))),
        }
    }
}
