//! Gap descriptors emitted by series analysis.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A hole between two known points of an ordered series.
///
/// `start_time` is the last known bar open before the hole and `end_time` the
/// first known bar open after it; the missing bars lie strictly between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gap {
    /// Last known point before the hole.
    pub start_time: DateTime<Utc>,
    /// First known point after the hole.
    pub end_time: DateTime<Utc>,
    /// Number of grid points absent between the two.
    pub missing_points: u64,
    /// Whether the UTC calendar date changes across the hole.
    pub crosses_day_boundary: bool,
}

/// Summary of one gap-analysis pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapStats {
    /// Number of holes found.
    pub gap_count: usize,
    /// Total grid points missing across all holes.
    pub missing_points: u64,
    /// Rows present in the analyzed series.
    pub observed_rows: u64,
    /// Rows the series' own first-to-last span should contain; populated only
    /// when span reconciliation was requested.
    pub expected_rows: Option<u64>,
}
