pub mod funding;
pub mod klines;

/// FNV-1a over the symbol bytes; stable across runs and platforms.
pub(crate) fn symbol_seed(symbol: &str) -> u64 {
    symbol.bytes().fold(0xcbf2_9ce4_8422_2325_u64, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0000_0100_0000_01b3)
    })
}

/// Splitmix64-style mix of the symbol seed and a grid slot index.
pub(crate) fn mix(seed: u64, slot: i64) -> u64 {
    let mut z = seed ^ (slot as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Price level in `[100.00, 120.00)` for a grid slot.
pub(crate) fn level(seed: u64, slot: i64) -> f64 {
    let cents = mix(seed, slot) % 2_000;
    100.0 + cents as f64 / 100.0
}
