//! Re-export of foundational types from `candela-types`.
// Consolidated re-exports so downstream crates can depend on `candela-core` only

pub use candela_types::{CandelaError, Capability};

pub use candela_types::ConnectorKey;
pub use candela_types::{BackoffConfig, CandelaConfig, GapPolicy};
pub use candela_types::ArchiveDay;
pub use candela_types::{Candle, DataSource, FundingRate};
pub use candela_types::{ChartType, Interval, MarketType};
pub use candela_types::{Coverage, DownloadReport, FetchReport, FundingReport, SourceSpan};
pub use candela_types::{Gap, GapStats};
pub use candela_types::{MetricsCollector, NoopMetrics};
pub use candela_types::{AlignedRange, TimeRange, TimestampUnit};
