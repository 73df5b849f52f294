//! Funding-rate retrieval pipeline.
//!
//! Settlements land on the 8-hour UTC grid, so the pipeline reuses the
//! candle machinery at [`Interval::I8h`]: cache fragments first, then the
//! live endpoint for the remainder, merged by provenance priority. There is
//! no bulk-archive tier here; funding endpoints serve arbitrary history
//! directly, so missing spans skip straight from cache to live.

use chrono::NaiveDate;

use candela_core::connector::FundingRateProvider;
use candela_core::types::{
    CandelaError, Capability, ChartType, Coverage, DataSource, FundingRate, FundingReport,
    Interval, MarketType, MetricsCollector, TimeRange,
};
use candela_core::{
    CandelaConnector, align_request, estimate_record_count, find_gaps, identify_missing_segments,
    merge_adjacent_ranges, merge_funding_by_priority,
};
use candela_store::CacheKey;

use crate::core::{Candela, tag_err};
#[cfg(feature = "tracing")]
use crate::fetch::history::FetchPhase;
use crate::fetch::retry::{deadline_expired, request_deadline, with_retries};
use crate::fetch::util::collapse_errors;

impl Candela {
    /// Fetch merged funding settlements for `symbol` over the half-open `range`.
    ///
    /// Convenience wrapper over
    /// [`funding_rates_with_report`](Self::funding_rates_with_report) that
    /// returns the rows alone.
    ///
    /// # Errors
    /// See [`funding_rates_with_report`](Self::funding_rates_with_report).
    pub async fn funding_rates(
        &self,
        symbol: &str,
        market: MarketType,
        range: TimeRange,
    ) -> Result<Vec<FundingRate>, CandelaError> {
        Ok(self
            .funding_rates_with_report(symbol, market, range)
            .await?
            .rates)
    }

    /// Fetch merged funding settlements together with their coverage envelope.
    ///
    /// Funding exists on perpetual futures markets only; the settlement grid
    /// is fixed at eight hours, so no interval parameter is taken. Tier
    /// fallback, persistence, deadline handling, and coverage accounting all
    /// behave exactly as in [`klines_with_report`](Self::klines_with_report).
    ///
    /// # Errors
    /// `Unsupported` for a market without funding, `Validation` for an empty
    /// symbol or a range containing no settlement, and the same terminal
    /// errors as the candle pipeline otherwise.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "candela::fetch::funding_rates",
            skip(self),
            fields(symbol = %symbol, market = %market),
        )
    )]
    pub async fn funding_rates_with_report(
        &self,
        symbol: &str,
        market: MarketType,
        range: TimeRange,
    ) -> Result<FundingReport, CandelaError> {
        let symbol = symbol.trim().to_ascii_uppercase();
        if symbol.is_empty() {
            return Err(CandelaError::validation("symbol must not be empty"));
        }
        if !market.has_funding() {
            return Err(CandelaError::unsupported(Capability::FundingRates.as_str()));
        }
        let Some(aligned) = align_request(range, Interval::I8h) else {
            return Err(CandelaError::validation(format!(
                "range {} .. {} contains no complete funding settlement",
                range.start, range.end
            )));
        };
        let requested = aligned.as_time_range();
        let expected_rows = estimate_record_count(&aligned);
        let deadline = request_deadline(&self.cfg);

        let mut failures: Vec<CandelaError> = Vec::new();
        let mut warnings: Vec<CandelaError> = Vec::new();

        let mut cached = match self.cache.funding_rates(&symbol, market, requested).await {
            Ok(rows) => rows,
            Err(e) => {
                failures.push(tag_err(self.cache.name(), e));
                Vec::new()
            }
        };
        for r in &mut cached {
            r.source = DataSource::Cache;
        }
        if cached.is_empty() {
            self.metrics.record_cache_miss();
        } else {
            self.metrics.record_cache_hit(cached.len() as u64);
        }
        let cached_times: Vec<_> = cached.iter().map(|r| r.funding_time).collect();
        let missing = identify_missing_segments(&cached_times, &aligned);
        #[cfg(feature = "tracing")]
        tracing::debug!(
            phase = FetchPhase::CacheLookup.as_str(),
            rows = cached.len(),
            missing = missing.len(),
            "consulted cache tier"
        );

        let funding_conns = self.funding_tiers(market);
        let mut fetched: Vec<FundingRate> = Vec::new();
        if !missing.is_empty() && !funding_conns.is_empty() {
            let coalesced = merge_adjacent_ranges(&missing, Interval::I8h);
            #[cfg(feature = "tracing")]
            tracing::debug!(
                phase = FetchPhase::LiveFetch.as_str(),
                segments = coalesced.len(),
                "filling remaining spans from the live tier"
            );
            for segment in coalesced {
                if deadline_expired(deadline) {
                    break;
                }
                for conn in &funding_conns {
                    let Some(provider) = conn.as_funding_rate_provider() else {
                        continue;
                    };
                    match with_retries(
                        &self.cfg,
                        self.metrics.as_ref(),
                        conn.name(),
                        Capability::FundingRates.as_str(),
                        deadline,
                        || provider.funding_rates(&symbol, market, segment),
                    )
                    .await
                    {
                        Ok(mut rows) => {
                            self.metrics.record_live_fetch(rows.len() as u64);
                            for r in &mut rows {
                                r.source = DataSource::Live;
                            }
                            self.persist_funding(&symbol, market, &rows, &mut failures);
                            fetched.extend(
                                rows.into_iter().filter(|r| requested.contains(r.funding_time)),
                            );
                            break;
                        }
                        Err(e) => failures.push(tag_err(conn.name(), e)),
                    }
                }
            }
        }

        let merged = merge_funding_by_priority([cached, fetched]);
        let final_times: Vec<_> = merged.iter().map(|r| r.funding_time).collect();

        if merged.is_empty() {
            if deadline_expired(deadline) {
                return Err(CandelaError::request_timeout(
                    Capability::FundingRates.as_str(),
                ));
            }
            let attempted_any = !funding_conns.is_empty();
            return Err(collapse_errors(
                Capability::FundingRates,
                attempted_any,
                failures,
                Some(format!("funding rates for {symbol}")),
            ));
        }

        let (_, stats) = find_gaps(&final_times, Interval::I8h, &self.cfg.gap_policy, false);
        if stats.missing_points > 0 {
            self.metrics.record_gaps(stats.missing_points);
        }
        let coverage = Coverage {
            requested,
            expected_rows,
            actual_rows: merged.len() as u64,
            missing: identify_missing_segments(&final_times, &aligned),
        };
        if !coverage.is_full() {
            self.metrics
                .record_coverage_shortfall(expected_rows.saturating_sub(coverage.actual_rows));
            let shortfall = CandelaError::PartialCoverage {
                expected_rows,
                actual_rows: coverage.actual_rows,
            };
            if self.cfg.strict_coverage {
                return Err(shortfall);
            }
            warnings.push(shortfall);
        }
        warnings.extend(failures.into_iter().filter(CandelaError::is_actionable));
        #[cfg(feature = "tracing")]
        tracing::debug!(
            phase = FetchPhase::Done.as_str(),
            rows = merged.len(),
            warnings = warnings.len(),
            "retrieval complete"
        );
        Ok(FundingReport {
            symbol,
            rates: merged,
            coverage,
            warnings,
        })
    }

    /// Persist freshly fetched settlements, one cache file per touched day.
    ///
    /// Same read-merge-rewrite discipline as live candles: a partial fetch
    /// never clobbers a fuller day already on disk.
    fn persist_funding(
        &self,
        symbol: &str,
        market: MarketType,
        rows: &[FundingRate],
        failures: &mut Vec<CandelaError>,
    ) {
        let Some(first) = rows.first() else {
            return;
        };
        let base = CacheKey::derive(
            self.cache.provider(),
            ChartType::FundingRate,
            market,
            symbol,
            Interval::I8h,
            first.funding_time.date_naive(),
        );
        let mut days: Vec<NaiveDate> = rows.iter().map(|r| r.funding_time.date_naive()).collect();
        days.dedup();
        for day in days {
            let key = base.with_date(day);
            let fresh: Vec<FundingRate> = rows
                .iter()
                .filter(|r| r.funding_time.date_naive() == day)
                .cloned()
                .collect();
            let merged = match self.cache.store().load_funding(&key) {
                Ok(Some(existing)) => merge_funding_by_priority([existing, fresh]),
                Ok(None) => fresh,
                Err(e) => {
                    failures.push(tag_err(self.cache.name(), e));
                    continue;
                }
            };
            if let Err(e) = self.cache.store().save_funding(&key, &merged) {
                failures.push(tag_err(self.cache.name(), e));
            }
        }
    }
}
