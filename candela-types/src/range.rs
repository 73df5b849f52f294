//! Time ranges and the aligned form produced by boundary normalization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CandelaError;
use crate::market::Interval;

/// A half-open request window `[start, end)` in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    /// Inclusive start instant.
    pub start: DateTime<Utc>,
    /// Exclusive end instant.
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// Construct a validated range; `start` must precede `end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, CandelaError> {
        if start < end {
            Ok(Self { start, end })
        } else {
            Err(CandelaError::validation(format!(
                "range start {start} must precede end {end}"
            )))
        }
    }

    /// Length of the window.
    #[must_use]
    pub fn duration(&self) -> chrono::Duration {
        self.end - self.start
    }

    /// Whether `t` falls inside `[start, end)`.
    #[must_use]
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t < self.end
    }
}

/// An interval-grid-normalized request span.
///
/// Both bounds are inclusive bar-start markers on the interval grid; the
/// covered span therefore ends at `end + interval - 1µs`. Only the aligner
/// constructs these, which is what lets downstream code assume grid
/// membership without re-checking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignedRange {
    /// First bar open inside the request.
    pub start: DateTime<Utc>,
    /// Last bar open inside the request.
    pub end: DateTime<Utc>,
    /// Grid the bounds are aligned to.
    pub interval: Interval,
}

impl AlignedRange {
    /// The half-open window `[start, end + interval)` covered by this span.
    #[must_use]
    pub fn as_time_range(&self) -> TimeRange {
        TimeRange {
            start: self.start,
            end: self.end + self.interval.duration(),
        }
    }
}

/// Precision of raw integer timestamps in archive payloads.
///
/// The bulk archive switched precision at a calendar point, so decoders
/// re-detect the unit for every file rather than assuming one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimestampUnit {
    /// 13-digit epoch values.
    Millisecond,
    /// 16-digit epoch values.
    Microsecond,
}

impl TimestampUnit {
    /// Ticks per second for this unit.
    #[must_use]
    pub const fn per_second(self) -> i64 {
        match self {
            Self::Millisecond => 1_000,
            Self::Microsecond => 1_000_000,
        }
    }
}
