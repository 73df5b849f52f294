use std::collections::HashSet;
use std::time::Duration;

use futures::StreamExt;
use tokio::time::Instant;

use candela_core::types::{CandelaError, DownloadReport, Interval, MarketType, TimeRange};

use crate::core::Candela;
use crate::fetch::util::next_before_deadline;

/// Builder to orchestrate bulk candle downloads for multiple symbols.
#[derive(Debug)]
pub struct DownloadBuilder<'a> {
    pub(crate) candela: &'a Candela,
    pub(crate) symbols: Vec<String>,
    pub(crate) market: MarketType,
    pub(crate) interval: Interval,
    // Defer range validation until run(), to avoid panics on input.
    pub(crate) range: Option<TimeRange>,
    pub(crate) deadline: Option<Duration>,
}

impl<'a> DownloadBuilder<'a> {
    /// Create a new builder bound to a `Candela` instance.
    ///
    /// Behavior:
    /// - Starts with an empty symbol list, spot market, daily bars.
    /// - Defers range validation until `run()`.
    #[must_use]
    pub const fn new(candela: &'a Candela) -> Self {
        Self {
            candela,
            symbols: Vec::new(),
            market: MarketType::Spot,
            interval: Interval::D1,
            range: None,
            deadline: None,
        }
    }

    /// Replace the symbol list.
    ///
    /// Symbols are normalized to uppercase before duplicate detection, so
    /// `"btcusdt"` and `"BTCUSDT"` collide. Replaces any previously added
    /// symbols; use [`add_symbol`](Self::add_symbol) to append.
    ///
    /// # Errors
    /// Returns `Validation` on an empty symbol or a duplicate in the list.
    pub fn symbols<I, S>(mut self, symbols: I) -> Result<Self, CandelaError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let mut normalized = Vec::new();
        for s in symbols {
            let symbol = s.into().trim().to_ascii_uppercase();
            if symbol.is_empty() {
                return Err(CandelaError::validation("symbol must not be empty"));
            }
            if !seen.insert(symbol.clone()) {
                return Err(CandelaError::validation(format!(
                    "duplicate symbol '{symbol}' in symbols list"
                )));
            }
            normalized.push(symbol);
        }
        self.symbols = normalized;
        Ok(self)
    }

    /// Add a single symbol to the list.
    ///
    /// # Errors
    /// Returns `Validation` if the symbol is empty or already present.
    pub fn add_symbol(mut self, symbol: impl Into<String>) -> Result<Self, CandelaError> {
        let symbol = symbol.into().trim().to_ascii_uppercase();
        if symbol.is_empty() {
            return Err(CandelaError::validation("symbol must not be empty"));
        }
        if self.symbols.contains(&symbol) {
            return Err(CandelaError::validation(format!(
                "duplicate symbol '{symbol}' already exists in symbols list"
            )));
        }
        self.symbols.push(symbol);
        Ok(self)
    }

    /// Select the market every symbol trades on.
    #[must_use]
    pub const fn market(mut self, market: MarketType) -> Self {
        self.market = market;
        self
    }

    /// Select the bar interval shared by the batch.
    #[must_use]
    pub const fn interval(mut self, interval: Interval) -> Self {
        self.interval = interval;
        self
    }

    /// Set the half-open request window shared by the batch.
    #[must_use]
    pub const fn range(mut self, range: TimeRange) -> Self {
        self.range = Some(range);
        self
    }

    /// Cap the whole batch with a deadline.
    ///
    /// Behavior: overrides the orchestrator's request timeout for this batch;
    /// symbols unfinished at expiry are reported as timeout warnings and the
    /// finished ones are returned.
    #[must_use]
    pub const fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Execute the download across all symbols and aggregate results.
    ///
    /// Behavior and trade-offs:
    /// - Fans out one [`klines_with_report`](Candela::klines_with_report) per
    ///   symbol, at most
    ///   [`symbol_concurrency`](crate::CandelaBuilder::symbol_concurrency) in
    ///   flight at once, and collects per-symbol reports keyed by symbol.
    /// - Per-symbol failures populate the `warnings` vector with
    ///   `{symbol} failed: {error}` entries without aborting the batch.
    /// - A batch deadline never discards finished work: symbols still in
    ///   flight at expiry are abandoned and reported as timeout warnings
    ///   alongside the completed reports.
    ///
    /// # Errors
    /// Returns `Validation` if no symbols or no range were specified, or if
    /// the list holds duplicates.
    pub async fn run(self) -> Result<DownloadReport, CandelaError> {
        if self.symbols.is_empty() {
            return Err(CandelaError::validation("no symbols specified for download"));
        }
        // Re-check duplicates in case the list was assembled out of band.
        let mut seen = HashSet::new();
        for symbol in &self.symbols {
            if !seen.insert(symbol.clone()) {
                return Err(CandelaError::validation(format!(
                    "duplicate symbol '{symbol}' detected in symbols list"
                )));
            }
        }
        let Some(range) = self.range else {
            return Err(CandelaError::validation("no range specified for download"));
        };

        let candela = self.candela;
        let market = self.market;
        let interval = self.interval;
        let symbols = self.symbols;

        let deadline = self
            .deadline
            .or(candela.cfg.request_timeout)
            .map(|d| Instant::now() + d);
        let tasks = symbols.iter().map(|symbol| {
            let symbol = symbol.clone();
            async move {
                let result = candela
                    .klines_with_report(&symbol, market, interval, range)
                    .await;
                (symbol, result)
            }
        });

        let mut pending: HashSet<String> = symbols.iter().cloned().collect();
        let cap = candela.cfg.symbol_concurrency.max(1);
        let mut stream = futures::stream::iter(tasks).buffer_unordered(cap);
        let mut series = Vec::new();
        let mut warnings: Vec<CandelaError> = Vec::new();
        while let Some((symbol, result)) = next_before_deadline(&mut stream, deadline).await {
            pending.remove(&symbol);
            match result {
                Ok(report) => series.push(report),
                Err(e) => warnings.push(CandelaError::connector(symbol, e.to_string())),
            }
        }

        // Anything still pending ran out of deadline.
        let mut unfinished: Vec<String> = pending.into_iter().collect();
        unfinished.sort_unstable();
        for symbol in unfinished {
            warnings.push(CandelaError::request_timeout(format!("klines for {symbol}")));
        }

        series.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        Ok(DownloadReport { series, warnings })
    }
}

impl Candela {
    /// Begin building a bulk download request.
    ///
    /// Typical usage: chain `symbols`/`market`/`interval`/`range` then call
    /// `run()`.
    #[must_use]
    pub const fn download(&'_ self) -> DownloadBuilder<'_> {
        DownloadBuilder::new(self)
    }
}
