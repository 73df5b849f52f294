//! Candela-specific data transfer objects, configuration, and error primitives.
#![warn(missing_docs)]

mod archive;
mod candle;
mod capability;
mod config;
mod connector;
mod error;
mod funding;
mod gap;
mod market;
mod metrics;
mod range;
mod report;

pub use archive::ArchiveDay;
pub use candle::{Candle, DataSource};
pub use capability::Capability;
pub use config::{BackoffConfig, CandelaConfig, GapPolicy};
pub use connector::ConnectorKey;
pub use error::CandelaError;
pub use funding::FundingRate;
pub use gap::{Gap, GapStats};
pub use market::{ChartType, Interval, MarketType};
pub use metrics::{MetricsCollector, NoopMetrics};
pub use range::{AlignedRange, TimeRange, TimestampUnit};
pub use report::{Coverage, DownloadReport, FetchReport, FundingReport, SourceSpan};
