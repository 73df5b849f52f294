use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type for the candela workspace.
///
/// This wraps request validation failures, connector-tagged failures, the
/// integrity and corruption conditions raised by the storage layers, and an
/// aggregate for multi-source attempts.
#[derive(Debug, Error, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CandelaError {
    /// The requested capability is not implemented by the target connector.
    #[error("unsupported capability: {capability}")]
    Unsupported {
        /// A capability string describing what was requested (e.g. "klines").
        capability: String,
    },

    /// Issues with the returned or expected data (malformed rows, bad units, etc.).
    #[error("data issue: {0}")]
    Data(String),

    /// The request was rejected before any I/O (bad range, interval, or symbol).
    #[error("invalid request: {0}")]
    Validation(String),

    /// An individual connector returned a non-retryable error.
    #[error("{connector} failed: {msg}")]
    Connector {
        /// Connector name that failed.
        connector: String,
        /// Human-readable error message.
        msg: String,
    },

    /// Unknown/opaque error.
    #[error("unknown error: {0}")]
    Other(String),

    /// A resource, symbol, or archive day could not be found.
    #[error("not found: {what}")]
    NotFound {
        /// Description of the missing resource, e.g. "archive day 2024-01-01".
        what: String,
    },

    /// A connector failure in a class worth retrying (connect errors, timeouts, 5xx).
    #[error("transient failure from {connector}: {msg}")]
    Transient {
        /// Connector name that failed.
        connector: String,
        /// Human-readable error message.
        msg: String,
    },

    /// The upstream signalled a rate limit; retry after the provided delay.
    #[error("rate limited (retry_after_ms={retry_after_ms:?})")]
    RateLimited {
        /// Server-provided delay before the next attempt, when present.
        retry_after_ms: Option<u64>,
    },

    /// Checksum verification failed outside the freshness window.
    #[error("checksum mismatch for {path}: expected {expected}, got {actual}")]
    Integrity {
        /// Path or URL of the payload that failed verification.
        path: String,
        /// Expected hex digest from the checksum sidecar.
        expected: String,
        /// Digest computed over the fetched bytes.
        actual: String,
    },

    /// A cache entry could not be read back; it is marked invalid and treated as a miss.
    #[error("cache corruption at {path}: {reason}")]
    CacheCorruption {
        /// Path of the unreadable cache file.
        path: String,
        /// Why the read failed.
        reason: String,
    },

    /// The merged result covers less than the requested range.
    #[error("partial coverage: {actual_rows}/{expected_rows} rows")]
    PartialCoverage {
        /// Rows the aligned request span should contain.
        expected_rows: u64,
        /// Rows actually present in the merged result.
        actual_rows: u64,
    },

    /// Every source tier failed or returned nothing; contains the individual failures.
    #[error("all sources failed: {0:?}")]
    AllSourcesFailed(Vec<CandelaError>),

    /// An individual source call exceeded the configured timeout.
    #[error("provider timed out: {capability} via {connector}")]
    ProviderTimeout {
        /// Connector name that timed out.
        connector: String,
        /// Capability label (e.g. "klines", "funding-rates").
        capability: String,
    },

    /// The overall request exceeded the configured deadline.
    #[error("request timed out: {capability}")]
    RequestTimeout {
        /// Capability label for which the request timed out.
        capability: String,
    },
}

impl CandelaError {
    /// Helper: build an `Unsupported` error for a capability string.
    #[must_use]
    pub fn unsupported(cap: impl Into<String>) -> Self {
        Self::Unsupported {
            capability: cap.into(),
        }
    }

    /// Helper: build a `Validation` error from a description of the bad input.
    #[must_use]
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Helper: build a `Connector` error with the connector name and message.
    pub fn connector(connector: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Connector {
            connector: connector.into(),
            msg: msg.into(),
        }
    }

    /// Helper: build a `NotFound` error for a description of the missing resource.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Helper: build a `Transient` error with the connector name and message.
    pub fn transient(connector: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Transient {
            connector: connector.into(),
            msg: msg.into(),
        }
    }

    /// Helper: build a `CacheCorruption` error for a path and reason.
    pub fn cache_corruption(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CacheCorruption {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Helper: build a `ProviderTimeout` error.
    pub fn provider_timeout(connector: impl Into<String>, capability: impl Into<String>) -> Self {
        Self::ProviderTimeout {
            connector: connector.into(),
            capability: capability.into(),
        }
    }

    /// Helper: build a `RequestTimeout` error.
    #[must_use]
    pub fn request_timeout(capability: impl Into<String>) -> Self {
        Self::RequestTimeout {
            capability: capability.into(),
        }
    }

    /// Returns true if retrying the same call may succeed.
    ///
    /// Transient network failures, rate limits, and per-call timeouts qualify;
    /// validation, integrity, and not-found conditions do not.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Transient { .. } | Self::RateLimited { .. } | Self::ProviderTimeout { .. }
        )
    }

    /// Returns true if this error should be surfaced to users as actionable.
    ///
    /// Non-actionable errors are those indicating capability absence or a benign
    /// not-found condition. Aggregates are classified based on their contents.
    #[must_use]
    pub fn is_actionable(&self) -> bool {
        match self {
            Self::Unsupported { .. } | Self::NotFound { .. } => false,
            Self::AllSourcesFailed(inner) => inner.iter().any(Self::is_actionable),
            _ => true,
        }
    }

    /// Flatten nested `AllSourcesFailed` structures into a plain vector.
    ///
    /// This preserves other error variants as-is and unwraps recursively.
    #[must_use]
    pub fn flatten(self) -> Vec<Self> {
        match self {
            Self::AllSourcesFailed(list) => list.into_iter().flat_map(Self::flatten).collect(),
            other => vec![other],
        }
    }
}
