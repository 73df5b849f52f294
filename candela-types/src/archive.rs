//! Result of fetching one published day from a bulk archive.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::candle::Candle;

/// One decoded archive day together with its integrity outcome.
///
/// `verified` reports whether the payload matched its checksum sidecar.
/// Unverified days are still usable when the archive tier tolerates the
/// mismatch (freshly published files can trail their sidecars), but callers
/// persisting archive data must only ever persist verified days.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveDay {
    /// UTC calendar day the payload covers.
    pub date: NaiveDate,
    /// Decoded rows, ascending by `open_time`.
    pub candles: Vec<Candle>,
    /// Whether the payload hash matched the sidecar.
    pub verified: bool,
    /// Human-readable note when the day is usable but not verified.
    pub warning: Option<String>,
}
