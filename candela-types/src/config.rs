//! Configuration types shared across the orchestrator and connectors.
//!
//! Everything here is consumed at construction time. Nothing in the core
//! reads environment variables or configuration files; hosts build a
//! [`CandelaConfig`] however they like and hand it over.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::market::Interval;

/// Tolerances for deciding when a timestamp delta counts as a hole.
///
/// A delta is a gap when it exceeds `interval * (1 + tolerance)`. Pairs that
/// straddle a UTC midnight use the looser boundary tolerance, since the
/// day-sharded archive legitimately joins files there.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GapPolicy {
    /// Tolerance for consecutive points on the same UTC day.
    pub intra_day_tolerance: f64,
    /// Tolerance for consecutive points on different UTC days.
    pub day_boundary_tolerance: f64,
}

impl Default for GapPolicy {
    fn default() -> Self {
        Self {
            intra_day_tolerance: 0.5,
            day_boundary_tolerance: 1.0,
        }
    }
}

/// Exponential backoff configuration for retrying transient failures.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Minimum backoff delay in milliseconds.
    pub min_backoff_ms: u64,
    /// Maximum backoff delay in milliseconds.
    pub max_backoff_ms: u64,
    /// Exponential factor to increase delay after each failure (>= 1).
    pub factor: u32,
    /// Random jitter percentage [0, 100] added to each delay.
    pub jitter_percent: u8,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            min_backoff_ms: 500,
            max_backoff_ms: 16_000,
            factor: 2,
            jitter_percent: 20,
        }
    }
}

/// Global configuration for the `Candela` orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandelaConfig {
    /// Timeout for individual source-tier calls.
    pub provider_timeout: Duration,
    /// Optional overall deadline for one request. On expiry, in-flight fetches
    /// are abandoned and whatever has merged so far returns as a partial
    /// result; an empty result at expiry is a timeout error.
    pub request_timeout: Option<Duration>,
    /// Retries per live-tier call on transient failures, on top of the first
    /// attempt.
    pub max_retries: u32,
    /// Backoff schedule between retries.
    pub backoff: BackoffConfig,
    /// Concurrent archive-day downloads per request.
    pub archive_concurrency: usize,
    /// Per-interval caps overriding `archive_concurrency`; the smallest
    /// intervals produce the largest payloads and get the tightest caps.
    pub interval_concurrency_overrides: Vec<(Interval, usize)>,
    /// Concurrent symbols in bulk downloads.
    pub symbol_concurrency: usize,
    /// How far back the archive is considered not-yet-settled. Days ending
    /// inside this window are expected to be absent or unverified upstream,
    /// which is treated as "unavailable", not as an error.
    pub freshness_window: Duration,
    /// Gap-detection tolerances.
    pub gap_policy: GapPolicy,
    /// Escalate a coverage shortfall from a warning to an error.
    pub strict_coverage: bool,
}

impl CandelaConfig {
    /// Effective archive-day concurrency for `interval`.
    #[must_use]
    pub fn archive_concurrency_for(&self, interval: Interval) -> usize {
        self.interval_concurrency_overrides
            .iter()
            .find(|(i, _)| *i == interval)
            .map_or(self.archive_concurrency, |(_, cap)| *cap)
            .max(1)
    }
}

impl Default for CandelaConfig {
    fn default() -> Self {
        Self {
            provider_timeout: Duration::from_secs(30),
            request_timeout: None,
            max_retries: 3,
            backoff: BackoffConfig::default(),
            archive_concurrency: 12,
            interval_concurrency_overrides: vec![(Interval::I1s, 4), (Interval::I1m, 6)],
            symbol_concurrency: 8,
            freshness_window: Duration::from_secs(48 * 3_600),
            gap_policy: GapPolicy::default(),
            strict_coverage: false,
        }
    }
}
