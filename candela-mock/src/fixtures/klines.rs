use candela_core::{Candle, DataSource, Interval, TimeRange, align_request};
use chrono::{DateTime, NaiveDate, Utc};

use super::{level, mix, symbol_seed};

/// Synthesize one candle per grid slot covered by `range`.
///
/// Bars chain: each bar closes at the level the next bar opens at, so a
/// series stitched together from several sub-range calls is identical to one
/// generated in a single call.
pub fn series(
    symbol: &str,
    interval: Interval,
    range: TimeRange,
    source: DataSource,
) -> Vec<Candle> {
    let Some(aligned) = align_request(range, interval) else {
        return Vec::new();
    };
    let seed = symbol_seed(symbol);
    let step = interval.duration();
    let mut out = Vec::new();
    let mut open_time = aligned.start;
    while open_time <= aligned.end {
        out.push(bar(seed, open_time, interval, source));
        open_time += step;
    }
    out
}

/// One whole published UTC day of bars at `interval`.
pub fn day(symbol: &str, interval: Interval, date: NaiveDate, source: DataSource) -> Vec<Candle> {
    let start = date.and_hms_opt(0, 0, 0).unwrap().and_utc();
    let range = TimeRange {
        start,
        end: start + chrono::Duration::days(1),
    };
    series(symbol, interval, range, source)
}

fn bar(seed: u64, open_time: DateTime<Utc>, interval: Interval, source: DataSource) -> Candle {
    let slot = open_time.timestamp_micros() / interval.as_micros();
    let open = level(seed, slot);
    let close = level(seed, slot + 1);
    let mixed = mix(seed, slot);
    let volume = ((mixed >> 16) % 10_000) as f64 / 10.0 + 1.0;
    let quote_volume = volume * (open + close) / 2.0;
    Candle {
        open_time,
        close_time: open_time + interval.duration() - chrono::Duration::milliseconds(1),
        open,
        high: open.max(close) + 0.25,
        low: open.min(close) - 0.25,
        close,
        volume,
        quote_volume,
        trade_count: mixed % 500 + 1,
        taker_buy_base: volume / 2.0,
        taker_buy_quote: quote_volume / 2.0,
        source,
    }
}
