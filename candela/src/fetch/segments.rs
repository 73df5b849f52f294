use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use candela_core::types::TimeRange;

/// UTC days touched by the half-open `range`, in order.
///
/// Archive tiers publish whole days, so a segment that starts or ends
/// mid-day still pulls the full files and the caller trims afterwards.
pub(crate) fn expand_to_days(range: TimeRange) -> Vec<NaiveDate> {
    let last = (range.end - chrono::Duration::microseconds(1)).date_naive();
    let mut day = range.start.date_naive();
    let mut days = Vec::new();
    while day <= last {
        days.push(day);
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }
    days
}

/// Distinct UTC days covering all `segments`, sorted ascending.
pub(crate) fn days_to_fetch(segments: &[TimeRange]) -> Vec<NaiveDate> {
    let mut days = BTreeSet::new();
    for segment in segments {
        days.extend(expand_to_days(*segment));
    }
    days.into_iter().collect()
}

/// Whether `date` ends inside the freshness window before `now`.
///
/// Bulk archives trail real time; a day still inside the window is expected
/// to be unpublished, so the planner leaves it to the live tier instead of
/// burning a round trip on it.
pub(crate) fn day_inside_window(date: NaiveDate, now: DateTime<Utc>, window: Duration) -> bool {
    let Some(end) = day_end_utc(date) else {
        return true;
    };
    let window_secs = i64::try_from(window.as_secs()).unwrap_or(i64::MAX);
    (now - end).num_seconds() < window_secs
}

fn day_end_utc(date: NaiveDate) -> Option<DateTime<Utc>> {
    let midnight = date.succ_opt()?.and_hms_opt(0, 0, 0)?;
    Some(Utc.from_utc_datetime(&midnight))
}
