//! Funding-rate settlement rows for perpetual futures markets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::candle::DataSource;

/// One funding settlement.
///
/// Settlements land on the 8-hour UTC grid (00:00, 08:00, 16:00), so the
/// gap machinery treats funding series like an 8-hour candle series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingRate {
    /// Settlement instant.
    pub funding_time: DateTime<Utc>,
    /// Settled funding rate (e.g. `0.0001` for 1 bp).
    pub funding_rate: f64,
    /// Mark price at settlement, when the endpoint provides it.
    pub mark_price: Option<f64>,
    /// Which tier supplied this row.
    pub source: DataSource,
}
