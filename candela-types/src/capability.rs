//! Capability identifiers used in routing, errors, and instrumentation.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Data capabilities a connector can implement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    /// OHLCV candle retrieval.
    Klines,
    /// Funding-rate settlement retrieval.
    FundingRates,
    /// Bulk retrieval of whole published days with integrity verification.
    ArchiveDays,
}

impl Capability {
    /// Stable kebab-case label used in error messages and tracing fields.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Klines => "klines",
            Self::FundingRates => "funding-rates",
            Self::ArchiveDays => "archive-days",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
