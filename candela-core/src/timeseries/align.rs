//! Interval-grid boundary alignment and raw-timestamp unit detection.
//!
//! All grid math happens on absolute microsecond ticks since the Unix epoch.
//! Every supported interval divides a UTC day evenly, so flooring a tick to
//! the grid lands exactly on an exchange bar open.

use chrono::{DateTime, Utc};

use crate::types::{AlignedRange, CandelaError, Interval, TimeRange, TimestampUnit};

fn floor_to(step: i64, ticks: i64) -> i64 {
    ticks.div_euclid(step) * step
}

fn ceil_to(step: i64, ticks: i64) -> i64 {
    let floored = floor_to(step, ticks);
    if floored == ticks { ticks } else { floored + step }
}

/// Align an inclusive instant pair to the interval grid.
///
/// An off-grid `start` rounds **up** to the next bar open and an off-grid
/// `end` rounds **down** to the previous one, so only bars fully inside the
/// request survive. Both results are inclusive bar-open markers; the covered
/// span runs to `end + interval - 1µs`. Already-aligned inputs pass through
/// unchanged.
///
/// Returns `None` when rounding moves the bounds past each other, i.e. the
/// window is too narrow to contain a bar open. That is an empty request, not
/// an error.
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use candela_core::timeseries::align::align_boundaries;
/// use candela_core::types::Interval;
///
/// let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 30).unwrap();
/// let end = Utc.with_ymd_and_hms(2024, 1, 1, 0, 5, 10).unwrap();
/// let aligned = align_boundaries(start, end, Interval::I1m).unwrap();
/// assert_eq!(aligned.start, Utc.with_ymd_and_hms(2024, 1, 1, 0, 1, 0).unwrap());
/// assert_eq!(aligned.end, Utc.with_ymd_and_hms(2024, 1, 1, 0, 5, 0).unwrap());
/// ```
#[must_use]
pub fn align_boundaries(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    interval: Interval,
) -> Option<AlignedRange> {
    let step = interval.as_micros();
    let aligned_start = ceil_to(step, start.timestamp_micros());
    let aligned_end = floor_to(step, end.timestamp_micros());
    if aligned_end < aligned_start {
        return None;
    }
    Some(AlignedRange {
        start: DateTime::from_timestamp_micros(aligned_start)?,
        end: DateTime::from_timestamp_micros(aligned_end)?,
        interval,
    })
}

/// Align a half-open request window `[start, end)` to the interval grid.
///
/// Equivalent to [`align_boundaries`] over `[start, end - 1µs]`: a request
/// ending exactly on a bar open does not include that bar. Aligning
/// `[00:00, 01:00)` at one minute yields the 60 bars `00:00..=00:59`.
#[must_use]
pub fn align_request(range: TimeRange, interval: Interval) -> Option<AlignedRange> {
    let end_inclusive = range.end - chrono::Duration::microseconds(1);
    align_boundaries(range.start, end_inclusive, interval)
}

/// Infer the precision of a raw integer timestamp from its decimal width.
///
/// 13 digits is epoch milliseconds, 16 digits epoch microseconds. Anything
/// else is a format error: the supported widths are unambiguous for any
/// plausible market data (13 digits spans 2001..=2286), and guessing on
/// other widths would silently shift series by factors of a thousand.
///
/// The bulk archive changed precision at a calendar point, so decoders call
/// this once per file rather than assuming a workspace-wide unit.
///
/// ```
/// use candela_core::timeseries::align::detect_timestamp_unit;
/// use candela_core::types::TimestampUnit;
///
/// assert_eq!(detect_timestamp_unit(1_704_067_200_000).unwrap(), TimestampUnit::Millisecond);
/// assert_eq!(detect_timestamp_unit(1_704_067_200_000_000).unwrap(), TimestampUnit::Microsecond);
/// assert!(detect_timestamp_unit(1_704_067_200).is_err());
/// ```
///
/// # Errors
/// Returns `CandelaError::Data` for non-positive samples or unsupported
/// widths.
pub fn detect_timestamp_unit(sample: i64) -> Result<TimestampUnit, CandelaError> {
    let digits = if sample > 0 { sample.ilog10() + 1 } else { 0 };
    match digits {
        13 => Ok(TimestampUnit::Millisecond),
        16 => Ok(TimestampUnit::Microsecond),
        _ => Err(CandelaError::Data(format!(
            "cannot infer timestamp unit from {digits}-digit value {sample}"
        ))),
    }
}

/// Convert a raw integer timestamp in the detected unit to a UTC instant.
///
/// # Errors
/// Returns `CandelaError::Data` when the value overflows or falls outside
/// the representable range.
pub fn datetime_from_raw(raw: i64, unit: TimestampUnit) -> Result<DateTime<Utc>, CandelaError> {
    let micros = match unit {
        TimestampUnit::Millisecond => raw.checked_mul(1_000),
        TimestampUnit::Microsecond => Some(raw),
    }
    .ok_or_else(|| CandelaError::Data(format!("timestamp {raw} overflows microseconds")))?;
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| CandelaError::Data(format!("timestamp {raw} is out of range")))
}

/// Rows a fully populated aligned span contains.
///
/// Both bounds are inclusive bar opens, hence the `+ 1`.
#[must_use]
pub fn estimate_record_count(aligned: &AlignedRange) -> u64 {
    let span_secs = (aligned.end - aligned.start).num_seconds();
    u64::try_from(span_secs / aligned.interval.as_secs()).unwrap_or(0) + 1
}
