//! candela-core
//!
//! Core traits and utilities shared across the candela ecosystem.
//!
//! - `types`: re-exports of the shared data structures (candles, ranges, errors).
//! - `connector`: the `CandelaConnector` trait and capability provider traits.
//! - `checksum`: SHA-256 sidecar parsing and payload verification.
//! - `timeseries`: boundary alignment, gap analysis, and priority merging.
//!
//! The capability traits are `async_trait` traits and assume the Tokio
//! ecosystem as the async runtime, matching the orchestrator crate.
#![warn(missing_docs)]

/// Checksum sidecar parsing and SHA-256 payload verification.
pub mod checksum;
/// Connector capability traits and the primary `CandelaConnector` interface.
pub mod connector;
/// Time-series utilities for alignment, gap analysis, and merging.
pub mod timeseries;
pub mod types;

pub use checksum::{ChecksumRecord, extract_expected_hash, verify};
pub use connector::CandelaConnector;
pub use timeseries::align::{
    align_boundaries, align_request, datetime_from_raw, detect_timestamp_unit,
    estimate_record_count,
};
pub use timeseries::gaps::{find_gaps, identify_missing_segments, merge_adjacent_ranges};
pub use timeseries::merge::{merge_candles_by_priority, merge_funding_by_priority, source_spans};
pub use types::*;
