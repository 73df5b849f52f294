//! candela-binance
//!
//! Binance connectors for the candela retrieval engine: `BinanceArchive`
//! downloads and verifies day-sharded ZIP payloads from the public bulk
//! archive, and `BinanceLive` speaks the klines / funding-rate REST API for
//! the spot, USDⓈ-margined, and coin-margined markets. Both implement the
//! `CandelaConnector` capability surface from `candela-core`.
#![warn(missing_docs)]

mod http;

/// Bulk-archive connector: day-granular ZIP payloads with checksum policy.
pub mod archive;
/// REST connector: paginated klines and funding-rate settlements.
pub mod live;

pub use archive::{BinanceArchive, BinanceArchiveBuilder};
pub use live::{BinanceLive, BinanceLiveBuilder};
