use std::collections::HashSet;
use std::sync::Arc;

use candela_core::CandelaConnector;
use candela_core::types::{
    BackoffConfig, CandelaConfig, CandelaError, DataSource, GapPolicy, Interval, MarketType,
    MetricsCollector, NoopMetrics,
};
use candela_store::CacheConnector;

/// Orchestrator that reconciles cached, archived, and live series.
pub struct Candela {
    pub(crate) tiers: Vec<Arc<dyn CandelaConnector>>,
    pub(crate) cache: CacheConnector,
    pub(crate) cfg: CandelaConfig,
    pub(crate) metrics: Arc<dyn MetricsCollector>,
}

impl std::fmt::Debug for Candela {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Candela")
            .field(
                "tiers",
                &self.tiers.iter().map(|c| c.name()).collect::<Vec<_>>(),
            )
            .field("cache", &self.cache)
            .field("cfg", &self.cfg)
            .finish_non_exhaustive()
    }
}

/// Builder for constructing a `Candela` orchestrator with custom configuration.
pub struct CandelaBuilder {
    tiers: Vec<Arc<dyn CandelaConnector>>,
    cache: Option<CacheConnector>,
    cfg: CandelaConfig,
    metrics: Arc<dyn MetricsCollector>,
}

impl Default for CandelaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CandelaBuilder {
    /// Create a new builder with sensible defaults.
    ///
    /// Behavior and trade-offs:
    /// - Starts with no connectors and no cache tier; you must register at
    ///   least one connector via [`with_connector`](Self::with_connector) and
    ///   a cache via [`with_cache`](Self::with_cache).
    /// - Defaults come from [`CandelaConfig::default`]: 30s provider timeout,
    ///   no request deadline, 3 retries, a dozen concurrent archive days,
    ///   48h freshness window, lenient coverage.
    /// - Metrics default to [`NoopMetrics`]; inject a collector to observe
    ///   cache hits, retries, and shortfalls.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tiers: vec![],
            cache: None,
            cfg: CandelaConfig::default(),
            metrics: Arc::new(NoopMetrics),
        }
    }

    /// Register a source connector.
    ///
    /// Behavior and trade-offs:
    /// - Registration order is consultation order within a tier: when several
    ///   archives (or several live sources) are registered, earlier ones are
    ///   tried first and later ones only on failure.
    /// - A connector serves every tier it advertises capabilities for; one
    ///   connector can be both an archive and a live source.
    /// - Connector names must be unique; [`build`](Self::build) rejects
    ///   duplicates.
    #[must_use]
    pub fn with_connector(mut self, c: Arc<dyn CandelaConnector>) -> Self {
        self.tiers.push(c);
        self
    }

    /// Attach the cache tier.
    ///
    /// Behavior and trade-offs:
    /// - The cache is consulted first on every request and receives verified
    ///   archive days and live rows as they are fetched.
    /// - Exactly one cache tier is supported; calling this twice keeps the
    ///   last one.
    /// - The connector's provider label scopes the key space, so two
    ///   orchestrators sharing one store stay isolated when their labels
    ///   differ.
    #[must_use]
    pub fn with_cache(mut self, cache: CacheConnector) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Inject a metrics collector.
    ///
    /// Behavior and trade-offs:
    /// - Hooks fire from the request path; implementations must be cheap and
    ///   non-blocking.
    /// - Defaults to [`NoopMetrics`] when not called.
    #[must_use]
    pub fn metrics(mut self, metrics: Arc<dyn MetricsCollector>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Set the per-source call timeout.
    ///
    /// Behavior and trade-offs:
    /// - Bounds each archive-day download and each live fetch attempt; an
    ///   expired call surfaces as `ProviderTimeout` and counts as transient
    ///   for retry purposes.
    /// - Does not bound the request as a whole; see
    ///   [`request_timeout`](Self::request_timeout) for that.
    #[must_use]
    pub const fn provider_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.cfg.provider_timeout = timeout;
        self
    }

    /// Set an overall deadline for one request.
    ///
    /// Behavior and trade-offs:
    /// - On expiry, in-flight fetches are abandoned and whatever has merged
    ///   so far returns as a partial result with coverage accounting; a
    ///   result with zero rows at expiry is a `RequestTimeout` error.
    /// - Leave unset for unbounded requests (the default).
    #[must_use]
    pub const fn request_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.cfg.request_timeout = Some(timeout);
        self
    }

    /// Set how many times a transient live-tier failure is retried.
    ///
    /// Behavior and trade-offs:
    /// - Counts retries on top of the first attempt; zero disables retrying.
    /// - Only transient classes are retried (connect failures, timeouts,
    ///   rate limits); validation and integrity failures fail fast.
    #[must_use]
    pub const fn max_retries(mut self, retries: u32) -> Self {
        self.cfg.max_retries = retries;
        self
    }

    /// Provide a custom backoff schedule for retries.
    ///
    /// Behavior and trade-offs:
    /// - Delays grow by `factor` from `min_backoff_ms` up to
    ///   `max_backoff_ms`, with `jitter_percent` of random spread on top.
    /// - A rate-limit response carrying a server delay overrides the
    ///   computed base for that attempt.
    #[must_use]
    pub const fn backoff(mut self, cfg: BackoffConfig) -> Self {
        self.cfg.backoff = cfg;
        self
    }

    /// Cap concurrent archive-day downloads per request.
    ///
    /// Behavior and trade-offs:
    /// - Higher caps shorten large backfills but increase burst load on the
    ///   archive host.
    /// - Per-interval overrides take precedence; see
    ///   [`interval_concurrency_override`](Self::interval_concurrency_override).
    #[must_use]
    pub const fn archive_concurrency(mut self, cap: usize) -> Self {
        self.cfg.archive_concurrency = cap;
        self
    }

    /// Override the archive-day concurrency cap for one interval.
    ///
    /// Behavior and trade-offs:
    /// - The smallest intervals produce the largest day payloads; tighter
    ///   caps there keep memory and bandwidth bounded.
    /// - Later overrides for the same interval shadow earlier ones.
    #[must_use]
    pub fn interval_concurrency_override(mut self, interval: Interval, cap: usize) -> Self {
        self.cfg
            .interval_concurrency_overrides
            .retain(|(i, _)| *i != interval);
        self.cfg.interval_concurrency_overrides.push((interval, cap));
        self
    }

    /// Cap concurrent symbols in bulk downloads.
    ///
    /// Behavior and trade-offs:
    /// - Applies to [`DownloadBuilder::run`](crate::DownloadBuilder::run)
    ///   fan-out only; single-symbol requests ignore it.
    #[must_use]
    pub const fn symbol_concurrency(mut self, cap: usize) -> Self {
        self.cfg.symbol_concurrency = cap;
        self
    }

    /// Set how far back the archive is considered not yet settled.
    ///
    /// Behavior and trade-offs:
    /// - Days ending inside the window are expected to be absent or
    ///   unverified upstream; their absence is "unavailable", not a failure,
    ///   and the live tier covers them instead.
    /// - Shorter windows reach the archive sooner at the cost of more
    ///   checksum mismatches on freshly published days.
    #[must_use]
    pub const fn freshness_window(mut self, window: std::time::Duration) -> Self {
        self.cfg.freshness_window = window;
        self
    }

    /// Set gap-detection tolerances.
    ///
    /// Behavior and trade-offs:
    /// - Looser tolerances report fewer gaps on series with legitimate
    ///   irregularities (trading halts, day-boundary joins).
    /// - Fetch planning always uses the exact grid; tolerances only affect
    ///   reporting and metrics.
    #[must_use]
    pub const fn gap_policy(mut self, policy: GapPolicy) -> Self {
        self.cfg.gap_policy = policy;
        self
    }

    /// Escalate coverage shortfalls from warnings to errors.
    ///
    /// Behavior and trade-offs:
    /// - When enabled, a merged result short of the aligned span returns
    ///   `PartialCoverage` as an error instead of a usable partial result.
    /// - Leave disabled (the default) for callers that prefer data with
    ///   explicit coverage accounting over no data.
    #[must_use]
    pub const fn strict_coverage(mut self, yes: bool) -> Self {
        self.cfg.strict_coverage = yes;
        self
    }

    /// Build the `Candela` orchestrator.
    ///
    /// # Errors
    /// Returns `Validation` if no connectors are registered, no cache tier is
    /// configured, or two connectors share a name.
    pub fn build(self) -> Result<Candela, CandelaError> {
        if self.tiers.is_empty() {
            return Err(CandelaError::validation(
                "no connectors registered; add at least one via with_connector(...)",
            ));
        }
        let Some(cache) = self.cache else {
            return Err(CandelaError::validation(
                "no cache tier configured; supply one via with_cache(...)",
            ));
        };

        let mut seen: HashSet<&'static str> = HashSet::from([cache.name()]);
        for c in &self.tiers {
            if !seen.insert(c.name()) {
                return Err(CandelaError::validation(format!(
                    "duplicate connector '{}' registered",
                    c.name()
                )));
            }
        }

        Ok(Candela {
            tiers: self.tiers,
            cache,
            cfg: self.cfg,
            metrics: self.metrics,
        })
    }
}

pub fn tag_err(connector: &str, e: CandelaError) -> CandelaError {
    match e {
        e @ (CandelaError::NotFound { .. }
        | CandelaError::Connector { .. }
        | CandelaError::Transient { .. }
        | CandelaError::RateLimited { .. }
        | CandelaError::Integrity { .. }
        | CandelaError::ProviderTimeout { .. }
        | CandelaError::RequestTimeout { .. }
        | CandelaError::AllSourcesFailed(_)) => e,
        other => CandelaError::Connector {
            connector: connector.to_string(),
            msg: other.to_string(),
        },
    }
}

impl Candela {
    /// Wrap a provider future with a timeout and standardized timeout error mapping.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "candela::core::provider_call_with_timeout",
            skip(fut),
            fields(
                connector = connector_name,
                capability = capability,
                timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            ),
        )
    )]
    pub(crate) async fn provider_call_with_timeout<T, Fut>(
        connector_name: &'static str,
        capability: &'static str,
        timeout: std::time::Duration,
        fut: Fut,
    ) -> Result<T, CandelaError>
    where
        Fut: core::future::Future<Output = Result<T, CandelaError>>,
    {
        (tokio::time::timeout(timeout, fut).await)
            .unwrap_or_else(|_| Err(CandelaError::provider_timeout(connector_name, capability)))
    }

    /// Start building a new `Candela` instance.
    ///
    /// Typical usage chains tier registration and configuration, e.g.:
    ///
    /// ```rust,ignore
    /// use std::sync::Arc;
    /// use candela::{Candela, CacheConnector, ParquetStore};
    ///
    /// let store = Arc::new(ParquetStore::open("./cache")?);
    /// let candela = Candela::builder()
    ///     .with_connector(archive)
    ///     .with_connector(live)
    ///     .with_cache(CacheConnector::new(store, "binance"))
    ///     .request_timeout(std::time::Duration::from_secs(120))
    ///     .build()?;
    /// ```
    #[must_use]
    pub fn builder() -> CandelaBuilder {
        CandelaBuilder::new()
    }

    /// Connectors eligible for the archive tier, in registration order.
    pub(crate) fn archive_tiers(&self, market: MarketType) -> Vec<Arc<dyn CandelaConnector>> {
        self.tiers
            .iter()
            .filter(|c| c.supports_market(market) && c.as_archive_provider().is_some())
            .cloned()
            .collect()
    }

    /// Connectors eligible for the live tier, in registration order.
    ///
    /// Eligibility requires market support, a `Live` provenance claim, and
    /// native support for the requested interval.
    pub(crate) fn live_tiers(
        &self,
        market: MarketType,
        interval: Interval,
    ) -> Vec<Arc<dyn CandelaConnector>> {
        self.tiers
            .iter()
            .filter(|c| c.supports_market(market) && c.source() == DataSource::Live)
            .filter(|c| {
                c.as_kline_provider()
                    .is_some_and(|p| p.supported_intervals(market).contains(&interval))
            })
            .cloned()
            .collect()
    }

    /// Connectors able to serve funding settlements, in registration order.
    pub(crate) fn funding_tiers(&self, market: MarketType) -> Vec<Arc<dyn CandelaConnector>> {
        self.tiers
            .iter()
            .filter(|c| c.supports_market(market) && c.as_funding_rate_provider().is_some())
            .cloned()
            .collect()
    }
}
