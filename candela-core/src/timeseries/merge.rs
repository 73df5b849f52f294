use std::collections::{BTreeMap, btree_map::Entry};

use chrono::{DateTime, Utc};

use crate::types::{Candle, FundingRate, SourceSpan};

/// Merge candle series from multiple tiers into one ordered series.
///
/// Rows are keyed by `open_time`. On a timestamp collision the row whose
/// `source` carries the higher priority wins (live beats cache beats archive
/// beats unknown), regardless of the order the series arrive in. Output is
/// sorted ascending and duplicate-free by construction.
#[must_use]
pub fn merge_candles_by_priority<I>(series: I) -> Vec<Candle>
where
    I: IntoIterator<Item = Vec<Candle>>,
{
    let mut map: BTreeMap<DateTime<Utc>, Candle> = BTreeMap::new();
    for s in series {
        for c in s {
            match map.entry(c.open_time) {
                Entry::Vacant(v) => {
                    v.insert(c);
                }
                Entry::Occupied(mut o) => {
                    if c.source.priority() > o.get().source.priority() {
                        o.insert(c);
                    }
                }
            }
        }
    }
    map.into_values().collect()
}

/// Merge funding series from multiple tiers, keyed by `funding_time`, with
/// the same priority semantics as [`merge_candles_by_priority`].
#[must_use]
pub fn merge_funding_by_priority<I>(series: I) -> Vec<FundingRate>
where
    I: IntoIterator<Item = Vec<FundingRate>>,
{
    let mut map: BTreeMap<DateTime<Utc>, FundingRate> = BTreeMap::new();
    for s in series {
        for r in s {
            match map.entry(r.funding_time) {
                Entry::Vacant(v) => {
                    v.insert(r);
                }
                Entry::Occupied(mut o) => {
                    if r.source.priority() > o.get().source.priority() {
                        o.insert(r);
                    }
                }
            }
        }
    }
    map.into_values().collect()
}

/// Attribute contiguous runs of a merged series to the tiers that supplied
/// them.
///
/// Walks the series in order and emits a span each time the winning source
/// changes. Span bounds are inclusive bar opens.
#[must_use]
pub fn source_spans(candles: &[Candle]) -> Vec<SourceSpan> {
    let mut spans: Vec<SourceSpan> = Vec::new();
    for c in candles {
        match spans.last_mut() {
            Some(span) if span.source == c.source => {
                span.end = c.open_time;
                span.rows += 1;
            }
            _ => spans.push(SourceSpan {
                source: c.source,
                start: c.open_time,
                end: c.open_time,
                rows: 1,
            }),
        }
    }
    spans
}
