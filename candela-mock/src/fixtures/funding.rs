use candela_core::{DataSource, FundingRate, Interval, TimeRange, align_request};

use super::{level, mix, symbol_seed};

/// Synthesize one settlement per 8-hour grid slot covered by `range`.
///
/// Rates stay within the plausible band of roughly one basis point either
/// side of zero.
pub fn series(symbol: &str, range: TimeRange, source: DataSource) -> Vec<FundingRate> {
    let Some(aligned) = align_request(range, Interval::I8h) else {
        return Vec::new();
    };
    let seed = symbol_seed(symbol);
    let step = Interval::I8h.duration();
    let mut out = Vec::new();
    let mut funding_time = aligned.start;
    while funding_time <= aligned.end {
        let slot = funding_time.timestamp_micros() / Interval::I8h.as_micros();
        let signed = mix(seed, slot) % 201;
        out.push(FundingRate {
            funding_time,
            funding_rate: (signed as f64 - 100.0) / 1_000_000.0,
            mark_price: Some(level(seed, slot)),
            source,
        });
        funding_time += step;
    }
    out
}
