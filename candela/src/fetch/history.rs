//! Candle retrieval pipeline.
//!
//! One request walks the tiers in a fixed order: the cache contributes what
//! it already holds, missing spans are expanded to whole UTC days and pulled
//! concurrently from bulk archives, whatever still remains goes to the live
//! tier sequentially with retries, and the tiers' rows are reconciled into
//! one ascending de-duplicated series by provenance priority.

use std::fmt;

use chrono::{NaiveDate, Utc};
use futures::StreamExt;

use candela_core::connector::{ArchiveDayProvider, KlineProvider};
use candela_core::types::{
    ArchiveDay, Candle, CandelaError, Capability, ChartType, Coverage, DataSource, FetchReport,
    Interval, MarketType, MetricsCollector, TimeRange,
};
use candela_core::{
    CandelaConnector, align_request, estimate_record_count, find_gaps, identify_missing_segments,
    merge_adjacent_ranges, merge_candles_by_priority, source_spans,
};
use candela_store::CacheKey;

use crate::core::{Candela, tag_err};
use crate::fetch::retry::{deadline_expired, per_call_timeout, request_deadline, with_retries};
use crate::fetch::segments::{day_inside_window, days_to_fetch};
use crate::fetch::util::{collapse_errors, next_before_deadline};

/// Pipeline phase labels used in diagnostics.
///
/// One retrieval walks these in order; a phase with nothing to do is skipped
/// but never reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPhase {
    /// Boundary alignment and request validation.
    Align,
    /// Per-day cache fragments are read and missing spans identified.
    CacheLookup,
    /// Missing spans are expanded to whole UTC days and pulled concurrently
    /// from bulk archives.
    ArchiveFetch,
    /// Remaining spans are pulled sequentially from live endpoints.
    LiveFetch,
    /// De-duplication and provenance-priority merging.
    Reconcile,
    /// Coverage accounting and report assembly.
    Done,
}

impl FetchPhase {
    /// Stable lowercase label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Align => "align",
            Self::CacheLookup => "cache-lookup",
            Self::ArchiveFetch => "archive-fetch",
            Self::LiveFetch => "live-fetch",
            Self::Reconcile => "reconcile",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for FetchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one archive-day attempt across every eligible archive tier.
struct DayOutcome {
    fetched: Option<(&'static str, ArchiveDay)>,
    failures: Vec<CandelaError>,
}

impl Candela {
    /// Fetch a merged candle series for `symbol` over the half-open `range`.
    ///
    /// Convenience wrapper over [`klines_with_report`](Self::klines_with_report)
    /// that discards the coverage envelope and returns the rows alone.
    ///
    /// # Errors
    /// See [`klines_with_report`](Self::klines_with_report).
    pub async fn klines(
        &self,
        symbol: &str,
        market: MarketType,
        interval: Interval,
        range: TimeRange,
    ) -> Result<Vec<Candle>, CandelaError> {
        Ok(self
            .klines_with_report(symbol, market, interval, range)
            .await?
            .candles)
    }

    /// Fetch a merged candle series together with its coverage envelope.
    ///
    /// Behavior and trade-offs:
    /// - Tiers are consulted cheapest-first: cache, then bulk archive (whole
    ///   UTC days, concurrently), then live endpoints (remaining spans,
    ///   sequentially with retries). A tier failure is absorbed and the next
    ///   tier covers for it; only a fully empty result is an error.
    /// - Verified archive days and all live rows are persisted to the cache
    ///   as they arrive, so repeated requests converge on cache-only reads.
    /// - Timestamp collisions between tiers resolve by provenance priority
    ///   (live over cache over archive), never by fetch order.
    /// - A result shorter than the aligned request span comes back with
    ///   coverage accounting and a `PartialCoverage` warning, or as an error
    ///   under [`strict_coverage`](crate::CandelaBuilder::strict_coverage).
    /// - With a [`request_timeout`](crate::CandelaBuilder::request_timeout)
    ///   configured, expiry abandons in-flight fetches and returns whatever
    ///   has merged so far through the partial-coverage path.
    ///
    /// # Errors
    /// `Validation` for an empty symbol, an interval the market does not
    /// publish, or a range containing no complete bar. `AllSourcesFailed` or
    /// `NotFound` when every tier produced nothing, `RequestTimeout` when the
    /// deadline expired with zero rows, and `PartialCoverage` only under
    /// strict coverage.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(
            name = "candela::fetch::klines",
            skip(self),
            fields(symbol = %symbol, market = %market, interval = %interval),
        )
    )]
    pub async fn klines_with_report(
        &self,
        symbol: &str,
        market: MarketType,
        interval: Interval,
        range: TimeRange,
    ) -> Result<FetchReport, CandelaError> {
        let symbol = symbol.trim().to_ascii_uppercase();
        if symbol.is_empty() {
            return Err(CandelaError::validation("symbol must not be empty"));
        }
        if !market.supports_interval(interval) {
            return Err(CandelaError::validation(format!(
                "market '{market}' does not publish {interval} bars"
            )));
        }
        let Some(aligned) = align_request(range, interval) else {
            return Err(CandelaError::validation(format!(
                "range {} .. {} contains no complete {interval} bar",
                range.start, range.end
            )));
        };
        let requested = aligned.as_time_range();
        let expected_rows = estimate_record_count(&aligned);
        let deadline = request_deadline(&self.cfg);
        #[cfg(feature = "tracing")]
        tracing::debug!(
            phase = FetchPhase::Align.as_str(),
            start = %aligned.start,
            end = %aligned.end,
            expected_rows,
            "aligned request to the bar grid"
        );

        let mut failures: Vec<CandelaError> = Vec::new();
        let mut warnings: Vec<CandelaError> = Vec::new();

        // Cache tier. A read failure is absorbed; the remote tiers cover.
        let mut cached = match self.cache.klines(&symbol, market, interval, requested).await {
            Ok(rows) => rows,
            Err(e) => {
                failures.push(tag_err(self.cache.name(), e));
                Vec::new()
            }
        };
        for c in &mut cached {
            c.source = DataSource::Cache;
        }
        if cached.is_empty() {
            self.metrics.record_cache_miss();
        } else {
            self.metrics.record_cache_hit(cached.len() as u64);
        }
        let cached_times: Vec<_> = cached.iter().map(|c| c.open_time).collect();
        let missing = identify_missing_segments(&cached_times, &aligned);
        #[cfg(feature = "tracing")]
        tracing::debug!(
            phase = FetchPhase::CacheLookup.as_str(),
            rows = cached.len(),
            missing = missing.len(),
            "consulted cache tier"
        );

        // Archive tier: one concurrent download per missing UTC day, first
        // eligible connector wins. Days inside the freshness window are left
        // to the live tier without a round trip.
        let archive_conns = self.archive_tiers(market);
        let mut archive_rows: Vec<Candle> = Vec::new();
        if !missing.is_empty() && !archive_conns.is_empty() && !deadline_expired(deadline) {
            let now = Utc::now();
            let days: Vec<NaiveDate> = days_to_fetch(&missing)
                .into_iter()
                .filter(|d| !day_inside_window(*d, now, self.cfg.freshness_window))
                .collect();
            #[cfg(feature = "tracing")]
            tracing::debug!(
                phase = FetchPhase::ArchiveFetch.as_str(),
                segments = missing.len(),
                days = days.len(),
                "expanding missing spans to archive days"
            );
            let provider_timeout = self.cfg.provider_timeout;
            let day_futs = days.into_iter().map(|date| {
                let symbol = symbol.clone();
                let archives = archive_conns.clone();
                async move {
                    let mut failures = Vec::new();
                    for conn in &archives {
                        let Some(provider) = conn.as_archive_provider() else {
                            continue;
                        };
                        if !provider.day_available(date) {
                            continue;
                        }
                        let timeout = per_call_timeout(provider_timeout, deadline);
                        match Candela::provider_call_with_timeout(
                            conn.name(),
                            Capability::ArchiveDays.as_str(),
                            timeout,
                            provider.fetch_day(&symbol, market, interval, date),
                        )
                        .await
                        {
                            Ok(day) => {
                                return DayOutcome {
                                    fetched: Some((conn.name(), day)),
                                    failures,
                                };
                            }
                            Err(e) => failures.push(tag_err(conn.name(), e)),
                        }
                    }
                    DayOutcome {
                        fetched: None,
                        failures,
                    }
                }
            });
            let cap = self.cfg.archive_concurrency_for(interval);
            let mut stream = futures::stream::iter(day_futs).buffer_unordered(cap);
            while let Some(outcome) = next_before_deadline(&mut stream, deadline).await {
                for f in &outcome.failures {
                    if matches!(f, CandelaError::Integrity { .. }) {
                        self.metrics.record_checksum_failure();
                    }
                }
                failures.extend(outcome.failures);
                let Some((name, day)) = outcome.fetched else {
                    continue;
                };
                self.metrics
                    .record_archive_day(day.verified, day.candles.len() as u64);
                if let Some(note) = day.warning {
                    warnings.push(CandelaError::Data(format!("{name}: {note}")));
                }
                // Only a checksum-verified day is trustworthy enough to persist.
                if day.verified && !day.candles.is_empty() {
                    let key = CacheKey::derive(
                        self.cache.provider(),
                        ChartType::Klines,
                        market,
                        &symbol,
                        interval,
                        day.date,
                    );
                    if let Err(e) = self.cache.store().save(&key, &day.candles) {
                        failures.push(tag_err(self.cache.name(), e));
                    }
                }
                archive_rows.extend(
                    day.candles
                        .into_iter()
                        .filter(|c| requested.contains(c.open_time))
                        .map(|mut c| {
                            c.source = DataSource::Archive;
                            c
                        }),
                );
            }
        }

        let mut covered: Vec<_> = cached
            .iter()
            .chain(archive_rows.iter())
            .map(|c| c.open_time)
            .collect();
        covered.sort_unstable();
        covered.dedup();
        let missing = identify_missing_segments(&covered, &aligned);

        // Live tier: remaining spans in order, coalesced to cut request
        // count, first healthy connector per span wins.
        let live_conns = self.live_tiers(market, interval);
        let mut live_rows: Vec<Candle> = Vec::new();
        if !missing.is_empty() && !live_conns.is_empty() {
            let coalesced = merge_adjacent_ranges(&missing, interval);
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
                for conn in &live_conns {
                    let Some(provider) = conn.as_kline_provider() else {
                        continue;
                    };
                    if !provider.is_available(segment).await {
                        continue;
                    }
                    match with_retries(
                        &self.cfg,
                        self.metrics.as_ref(),
                        conn.name(),
                        Capability::Klines.as_str(),
                        deadline,
                        || provider.klines(&symbol, market, interval, segment),
                    )
                    .await
                    {
                        Ok(mut rows) => {
                            self.metrics.record_live_fetch(rows.len() as u64);
                            for c in &mut rows {
                                c.source = DataSource::Live;
                            }
                            self.persist_live_candles(
                                &symbol,
                                market,
                                interval,
                                &rows,
                                &mut failures,
                            );
                            live_rows
                                .extend(rows.into_iter().filter(|c| requested.contains(c.open_time)));
                            break;
                        }
                        Err(e) => failures.push(tag_err(conn.name(), e)),
                    }
                }
            }
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            phase = FetchPhase::Reconcile.as_str(),
            cache = cached.len(),
            archive = archive_rows.len(),
            live = live_rows.len(),
            "merging tiers by provenance priority"
        );
        let merged = merge_candles_by_priority([cached, archive_rows, live_rows]);
        let final_times: Vec<_> = merged.iter().map(|c| c.open_time).collect();

        if merged.is_empty() {
            if deadline_expired(deadline) {
                return Err(CandelaError::request_timeout(Capability::Klines.as_str()));
            }
            let attempted_any = !archive_conns.is_empty() || !live_conns.is_empty();
            return Err(collapse_errors(
                Capability::Klines,
                attempted_any,
                failures,
                Some(format!("klines for {symbol}")),
            ));
        }

        let (_, stats) = find_gaps(&final_times, interval, &self.cfg.gap_policy, false);
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
        let spans = source_spans(&merged);
        #[cfg(feature = "tracing")]
        tracing::debug!(
            phase = FetchPhase::Done.as_str(),
            rows = merged.len(),
            spans = spans.len(),
            warnings = warnings.len(),
            "retrieval complete"
        );
        Ok(FetchReport {
            symbol,
            interval,
            candles: merged,
            coverage,
            spans,
            warnings,
        })
    }

    /// Persist freshly fetched live rows, one cache file per touched day.
    ///
    /// A partial fetch must not clobber a fuller day already on disk, so each
    /// day is read back, merged by provenance priority, and rewritten. Write
    /// failures degrade the cache, not the request, and are recorded as
    /// absorbed failures.
    fn persist_live_candles(
        &self,
        symbol: &str,
        market: MarketType,
        interval: Interval,
        rows: &[Candle],
        failures: &mut Vec<CandelaError>,
    ) {
        let Some(first) = rows.first() else {
            return;
        };
        let base = CacheKey::derive(
            self.cache.provider(),
            ChartType::Klines,
            market,
            symbol,
            interval,
            first.open_time.date_naive(),
        );
        // Rows arrive ascending, so consecutive dedup yields the day list.
        let mut days: Vec<NaiveDate> = rows.iter().map(|c| c.open_time.date_naive()).collect();
        days.dedup();
        for day in days {
            let key = base.with_date(day);
            let fresh: Vec<Candle> = rows
                .iter()
                .filter(|c| c.open_time.date_naive() == day)
                .cloned()
                .collect();
            let merged = match self.cache.store().load(&key) {
                Ok(Some(existing)) => merge_candles_by_priority([existing, fresh]),
                Ok(None) => fresh,
                Err(e) => {
                    failures.push(tag_err(self.cache.name(), e));
                    continue;
                }
            };
            if let Err(e) = self.cache.store().save(&key, &merged) {
                failures.push(tag_err(self.cache.name(), e));
            }
        }
    }
}
