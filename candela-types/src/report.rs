//! Report envelopes produced by the orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::candle::{Candle, DataSource};
use crate::error::CandelaError;
use crate::funding::FundingRate;
use crate::market::Interval;
use crate::range::TimeRange;

/// How much of the requested span the merged result actually covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coverage {
    /// The request window after boundary alignment.
    pub requested: TimeRange,
    /// Rows a fully covered window would contain.
    pub expected_rows: u64,
    /// Rows present in the merged result.
    pub actual_rows: u64,
    /// Sub-ranges still missing after all tiers were consulted.
    pub missing: Vec<TimeRange>,
}

impl Coverage {
    /// Whether the result covers the whole request.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.missing.is_empty() && self.actual_rows >= self.expected_rows
    }
}

/// A contiguous run of rows supplied by one tier of the merged output.
///
/// Built during reconciliation by walking the de-duplicated series and
/// emitting a span whenever the winning source changes. Useful for debugging
/// merge decisions and per-tier coverage over time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpan {
    /// Tier that supplied the run.
    pub source: DataSource,
    /// Inclusive first bar open of the run.
    pub start: DateTime<Utc>,
    /// Inclusive last bar open of the run.
    pub end: DateTime<Utc>,
    /// Rows in the run.
    pub rows: u64,
}

/// Result of one candle retrieval.
///
/// Carries the merged series together with coverage accounting, per-tier
/// span attribution, and any non-fatal warnings encountered on the way
/// (absorbed tier failures, downgraded integrity issues, shortfalls).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchReport {
    /// Requested symbol.
    pub symbol: String,
    /// Requested interval.
    pub interval: Interval,
    /// Merged, ordered, de-duplicated series.
    pub candles: Vec<Candle>,
    /// Coverage accounting for the aligned request window.
    pub coverage: Coverage,
    /// Which tier supplied which contiguous runs.
    pub spans: Vec<SourceSpan>,
    /// Non-fatal issues encountered while building the result.
    pub warnings: Vec<CandelaError>,
}

/// Result of one funding-rate retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingReport {
    /// Requested symbol.
    pub symbol: String,
    /// Merged, ordered, de-duplicated settlements.
    pub rates: Vec<FundingRate>,
    /// Coverage accounting for the aligned request window.
    pub coverage: Coverage,
    /// Non-fatal issues encountered while building the result.
    pub warnings: Vec<CandelaError>,
}

/// Result of a bulk multi-symbol download.
///
/// Per-symbol outcomes live in `series` (keyed by `FetchReport::symbol`);
/// symbols that failed outright are reported in `warnings` instead of
/// aborting the batch.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DownloadReport {
    /// Successful per-symbol reports.
    pub series: Vec<FetchReport>,
    /// Batch-level failures, one per symbol that produced no report.
    pub warnings: Vec<CandelaError>,
}
