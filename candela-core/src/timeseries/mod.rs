//! Time-series utilities shared by connectors and the orchestrator.
//!
//! Modules include:
//! - `align`: interval-grid boundary alignment and timestamp-unit detection
//! - `gaps`: hole detection and missing-segment fetch planning
//! - `merge`: priority merging and source-span attribution
/// Boundary alignment and raw-timestamp unit helpers.
pub mod align;
/// Gap detection and fetch-plan helpers.
pub mod gaps;
/// Merge utilities for joining per-tier series.
pub mod merge;
