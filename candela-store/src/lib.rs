//! Day-sharded parquet cache for candle and funding-rate series.
//!
//! The store owns a directory tree that mirrors the upstream bulk archive
//! layout, one parquet file per symbol/interval/UTC-day. Alongside the data
//! files it keeps a single JSON index with per-entry bookkeeping (row count,
//! time span, byte size, poison flag). The index is guarded by one mutex per
//! store instance and flushed to disk through a write-to-temp-then-rename on
//! every mutating call, so a crash can lose at most the mutation in flight
//! and never leaves the index half-written.
//!
//! Reads are deliberately forgiving: a missing file, a file below the
//! minimum plausible size, or an entry poisoned by an earlier failed read
//! all surface as a plain cache miss. Only a fresh [`ParquetStore::save`]
//! heals a poisoned entry.
//!
//! [`CacheConnector`] adapts a shared store to the connector traits so the
//! cache can sit in the same fallback chain as remote sources.

#![warn(missing_docs)]

pub mod connector;
pub mod key;
pub mod store;

pub use connector::CacheConnector;
pub use key::CacheKey;
pub use store::{CacheEntryMeta, MIN_FILE_BYTES, ParquetStore};
