//! Injected metrics seam.
//!
//! The orchestrator and connectors report counters through a caller-supplied
//! trait object rather than a global registry, so hosts can wire these into
//! whatever telemetry they already run. All hooks default to no-ops.

/// Sink for operational counters emitted during retrieval.
///
/// Implementations must be cheap and non-blocking; hooks are called from the
/// request path.
pub trait MetricsCollector: Send + Sync {
    /// Rows served from the cache tier for one request.
    fn record_cache_hit(&self, rows: u64) {
        let _ = rows;
    }

    /// A request found nothing usable in the cache tier.
    fn record_cache_miss(&self) {}

    /// One archive day finished: whether its checksum verified, and how many
    /// rows it decoded to.
    fn record_archive_day(&self, verified: bool, rows: u64) {
        let _ = (verified, rows);
    }

    /// One live-tier call completed with this many rows.
    fn record_live_fetch(&self, rows: u64) {
        let _ = rows;
    }

    /// A transient failure triggered retry attempt `attempt` (1-based).
    fn record_retry(&self, attempt: u32) {
        let _ = attempt;
    }

    /// A checksum failed verification.
    fn record_checksum_failure(&self) {}

    /// Gap analysis found holes totalling `missing_points` grid points.
    fn record_gaps(&self, missing_points: u64) {
        let _ = missing_points;
    }

    /// A request completed short of full coverage by `missing_rows` rows.
    fn record_coverage_shortfall(&self, missing_rows: u64) {
        let _ = missing_rows;
    }
}

/// Default collector that drops every observation.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl MetricsCollector for NoopMetrics {}
