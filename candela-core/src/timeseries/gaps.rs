//! Gap detection and missing-segment fetch planning.
//!
//! Both candle and funding series route through here, so everything operates
//! on plain sorted `DateTime<Utc>` slices (bar opens / settlement instants)
//! rather than on row types.

use chrono::{DateTime, Utc};

use crate::types::{AlignedRange, Gap, GapPolicy, GapStats, Interval, TimeRange};

/// Scan a sorted series for holes between consecutive points.
///
/// A delta counts as a hole when it exceeds `interval * (1 + tolerance)`;
/// pairs that straddle a UTC midnight use `policy.day_boundary_tolerance`,
/// everything else `policy.intra_day_tolerance`. The day-sharded archive
/// legitimately stitches files together at midnight, which is why that
/// boundary gets the looser read.
///
/// With `enforce_min_span` the returned stats also carry the row count the
/// series' own first-to-last span should have, letting callers reconcile
/// totals; per-tier partial analyses pass `false` and skip that accounting.
///
/// The input must be sorted ascending and duplicate-free; the aligner and
/// merge steps upstream guarantee that.
#[must_use]
pub fn find_gaps(
    times: &[DateTime<Utc>],
    interval: Interval,
    policy: &GapPolicy,
    enforce_min_span: bool,
) -> (Vec<Gap>, GapStats) {
    let step = interval.as_micros();
    let mut gaps = Vec::new();
    let mut missing_total: u64 = 0;

    for pair in times.windows(2) {
        let (curr, next) = (pair[0], pair[1]);
        let delta = next.timestamp_micros() - curr.timestamp_micros();
        let crosses = curr.date_naive() != next.date_naive();
        let tolerance = if crosses {
            policy.day_boundary_tolerance
        } else {
            policy.intra_day_tolerance
        };
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
        let limit = (step as f64 * (1.0 + tolerance)) as i64;
        if delta > limit {
            let missing = u64::try_from(delta / step).unwrap_or(0).saturating_sub(1);
            missing_total += missing;
            gaps.push(Gap {
                start_time: curr,
                end_time: next,
                missing_points: missing,
                crosses_day_boundary: crosses,
            });
        }
    }

    let expected_rows = if enforce_min_span {
        times.first().zip(times.last()).map(|(first, last)| {
            let span = last.timestamp_micros() - first.timestamp_micros();
            u64::try_from(span / step).unwrap_or(0) + 1
        })
    } else {
        None
    };

    let stats = GapStats {
        gap_count: gaps.len(),
        missing_points: missing_total,
        observed_rows: times.len() as u64,
        expected_rows,
    };
    (gaps, stats)
}

/// Turn known points into the sub-ranges that still need fetching.
///
/// Produces, in order: a leading segment when the first known point sits
/// after the requested start; one segment per internal hole, shifted one
/// interval forward so it begins strictly after the last known point; and a
/// trailing segment when the last known point leaves room before the
/// requested end. An empty input yields exactly one segment spanning the
/// whole request.
///
/// Unlike [`find_gaps`], planning uses the exact grid with no tolerance: any
/// absent bar is worth fetching even if reporting would not call it a gap.
///
/// The input must be sorted ascending and clipped to the requested span.
#[must_use]
pub fn identify_missing_segments(
    times: &[DateTime<Utc>],
    requested: &AlignedRange,
) -> Vec<TimeRange> {
    let step = requested.interval.duration();
    let covered_end = requested.as_time_range().end;

    let Some((&first, &last)) = times.first().zip(times.last()) else {
        return vec![requested.as_time_range()];
    };

    let mut segments = Vec::new();
    if first > requested.start {
        segments.push(TimeRange {
            start: requested.start,
            end: first,
        });
    }
    for pair in times.windows(2) {
        let (curr, next) = (pair[0], pair[1]);
        if next - curr > step {
            segments.push(TimeRange {
                start: curr + step,
                end: next,
            });
        }
    }
    if last + step < covered_end {
        segments.push(TimeRange {
            start: last + step,
            end: covered_end,
        });
    }
    segments
}

/// Coalesce nearby ranges to bound upstream call counts.
///
/// Ranges are sorted by start and merged whenever the spacing between one
/// range's end and the next range's start is at most `2 * interval`;
/// overlapping ranges merge unconditionally.
#[must_use]
pub fn merge_adjacent_ranges(ranges: &[TimeRange], interval: Interval) -> Vec<TimeRange> {
    let mut sorted = ranges.to_vec();
    sorted.sort_by_key(|r| r.start);

    let slack = interval.duration() * 2;
    let mut out: Vec<TimeRange> = Vec::with_capacity(sorted.len());
    for r in sorted {
        match out.last_mut() {
            Some(prev) if r.start - prev.end <= slack => {
                if r.end > prev.end {
                    prev.end = r.end;
                }
            }
            _ => out.push(r),
        }
    }
    out
}
