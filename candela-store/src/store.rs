//! Parquet persistence with a poisonable, crash-consistent metadata index.

use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use candela_core::types::{Candle, CandelaError, ChartType, DataSource, FundingRate};

use crate::key::CacheKey;

/// Parquet payloads smaller than this are treated as cache misses.
///
/// Even an empty parquet file carries a header, schema, and footer, so
/// anything below this threshold cannot hold a single row and is either
/// truncated or the residue of an interrupted write.
pub const MIN_FILE_BYTES: u64 = 256;

const INDEX_FILE: &str = "index.json";
const INDEX_TMP_FILE: &str = "index.json.tmp";

const CANDLE_COLUMNS: [&str; 11] = [
    "open_time_ms",
    "open",
    "high",
    "low",
    "close",
    "volume",
    "close_time_ms",
    "quote_volume",
    "trade_count",
    "taker_buy_base",
    "taker_buy_quote",
];

const FUNDING_COLUMNS: [&str; 3] = ["funding_time_ms", "funding_rate", "mark_price"];

/// Bookkeeping for one cached file, persisted in the store index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntryMeta {
    /// Number of rows in the file at save time.
    pub rows: u64,
    /// First row timestamp, unix milliseconds.
    pub start_ms: i64,
    /// Last row timestamp, unix milliseconds.
    pub end_ms: i64,
    /// Payload size in bytes after the write.
    pub bytes: u64,
    /// When the entry was written.
    pub created_at: DateTime<Utc>,
    /// When the entry was last served by a load.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_accessed: Option<DateTime<Utc>>,
    /// Whether a failed read has poisoned this entry.
    pub invalid: bool,
    /// Reason recorded by the failed read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalid_reason: Option<String>,
    /// When the entry was poisoned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalidated_at: Option<DateTime<Utc>>,
}

impl CacheEntryMeta {
    fn placeholder(now: DateTime<Utc>) -> Self {
        Self {
            rows: 0,
            start_ms: 0,
            end_ms: 0,
            bytes: 0,
            created_at: now,
            last_accessed: None,
            invalid: false,
            invalid_reason: None,
            invalidated_at: None,
        }
    }
}

/// Day-sharded parquet store rooted at a single directory.
///
/// All index mutations go through one mutex and every mutating call flushes
/// the index to disk before returning, trading write amplification for the
/// guarantee that a crash never leaves the index ahead of or behind the data
/// files by more than the mutation in flight.
#[derive(Debug)]
pub struct ParquetStore {
    root: PathBuf,
    index: Mutex<HashMap<String, CacheEntryMeta>>,
}

impl ParquetStore {
    /// Open (or create) a store rooted at `root` and load its index.
    ///
    /// An unreadable index is not fatal: the store starts with an empty one
    /// and re-learns entries as they are written. Unindexed data files are
    /// still served by [`ParquetStore::load`], which consults the index only
    /// for poison marks.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, CandelaError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| io_error(&root, &e))?;
        let index_path = root.join(INDEX_FILE);
        let entries = match fs::read_to_string(&index_path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(entries) => entries,
                Err(_err) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        path = %index_path.display(),
                        error = %_err,
                        "cache index unreadable, starting empty"
                    );
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };
        Ok(Self {
            root,
            index: Mutex::new(entries),
        })
    }

    /// Directory this store is rooted at.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path the data file for `key` lives at.
    ///
    /// Creates the parent directories as a side effect but never touches the
    /// data file itself; derivation stays pure with respect to file content.
    pub fn native_path(&self, key: &CacheKey) -> Result<PathBuf, CandelaError> {
        let path = self.root.join(key.relative_path());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| io_error(parent, &e))?;
        }
        Ok(path)
    }

    /// Persist a candle series under `key`, replacing any previous file.
    ///
    /// Refuses empty input: an empty file is indistinguishable from a failed
    /// write, so "nothing to cache" must stay a no-op at the call site.
    /// Rows are re-sorted by `open_time` before encoding regardless of what
    /// the caller claims about ordering. A successful save clears any poison
    /// mark on the entry.
    pub fn save(&self, key: &CacheKey, candles: &[Candle]) -> Result<(), CandelaError> {
        if key.chart_type != ChartType::Klines {
            return Err(CandelaError::validation(format!(
                "cache key chart type '{}' cannot hold candles",
                key.chart_type
            )));
        }
        if candles.is_empty() {
            return Err(CandelaError::validation("refusing to cache an empty series"));
        }
        let mut rows = candles.to_vec();
        rows.sort_by_key(|c| c.open_time);
        let mut df = candle_frame(&rows)?;
        let path = self.native_path(key)?;
        let bytes = self.write_frame(&path, &mut df)?;
        let meta = CacheEntryMeta {
            rows: rows.len() as u64,
            start_ms: rows[0].open_time.timestamp_millis(),
            end_ms: rows[rows.len() - 1].open_time.timestamp_millis(),
            bytes,
            created_at: Utc::now(),
            last_accessed: None,
            invalid: false,
            invalid_reason: None,
            invalidated_at: None,
        };
        let mut entries = self.index_guard();
        entries.insert(key.index_key(), meta);
        self.flush_index(&entries)?;
        #[cfg(feature = "tracing")]
        tracing::debug!(path = %path.display(), rows = rows.len(), "cached candle day");
        Ok(())
    }

    /// Read the candle series stored under `key`, if usable.
    ///
    /// Returns `Ok(None)` when the file is missing, below
    /// [`MIN_FILE_BYTES`], or the entry is poisoned. A structural read
    /// failure poisons the entry (reason and timestamp recorded) instead of
    /// being retried; only a future [`ParquetStore::save`] heals it. A
    /// successful load stamps `last_accessed` on the entry, which makes it a
    /// mutating call index-wise. Rows come back tagged
    /// [`DataSource::Cache`].
    pub fn load(&self, key: &CacheKey) -> Result<Option<Vec<Candle>>, CandelaError> {
        if key.chart_type != ChartType::Klines {
            return Ok(None);
        }
        let rel = key.index_key();
        if self.index_guard().get(&rel).is_some_and(|meta| meta.invalid) {
            return Ok(None);
        }
        let path = self.root.join(key.relative_path());
        let Some(bytes) = fs::metadata(&path).ok().map(|m| m.len()) else {
            return Ok(None);
        };
        if bytes < MIN_FILE_BYTES {
            return Ok(None);
        }
        match read_candles(&path) {
            Ok(rows) => {
                self.touch(&rel)?;
                Ok(Some(rows))
            }
            Err(err) => {
                self.mark_invalid(&rel, &err.to_string());
                Ok(None)
            }
        }
    }

    /// Persist a funding-rate series under `key`.
    ///
    /// Same contract as [`ParquetStore::save`]: non-empty input, re-sorted
    /// by settlement time, heals poison marks.
    pub fn save_funding(&self, key: &CacheKey, rates: &[FundingRate]) -> Result<(), CandelaError> {
        if key.chart_type != ChartType::FundingRate {
            return Err(CandelaError::validation(format!(
                "cache key chart type '{}' cannot hold funding rates",
                key.chart_type
            )));
        }
        if rates.is_empty() {
            return Err(CandelaError::validation("refusing to cache an empty series"));
        }
        let mut rows = rates.to_vec();
        rows.sort_by_key(|r| r.funding_time);
        let mut df = funding_frame(&rows)?;
        let path = self.native_path(key)?;
        let bytes = self.write_frame(&path, &mut df)?;
        let meta = CacheEntryMeta {
            rows: rows.len() as u64,
            start_ms: rows[0].funding_time.timestamp_millis(),
            end_ms: rows[rows.len() - 1].funding_time.timestamp_millis(),
            bytes,
            created_at: Utc::now(),
            last_accessed: None,
            invalid: false,
            invalid_reason: None,
            invalidated_at: None,
        };
        let mut entries = self.index_guard();
        entries.insert(key.index_key(), meta);
        self.flush_index(&entries)?;
        #[cfg(feature = "tracing")]
        tracing::debug!(path = %path.display(), rows = rows.len(), "cached funding day");
        Ok(())
    }

    /// Read the funding-rate series stored under `key`, if usable.
    ///
    /// Miss, poison, and `last_accessed` semantics match
    /// [`ParquetStore::load`].
    pub fn load_funding(&self, key: &CacheKey) -> Result<Option<Vec<FundingRate>>, CandelaError> {
        if key.chart_type != ChartType::FundingRate {
            return Ok(None);
        }
        let rel = key.index_key();
        if self.index_guard().get(&rel).is_some_and(|meta| meta.invalid) {
            return Ok(None);
        }
        let path = self.root.join(key.relative_path());
        let Some(bytes) = fs::metadata(&path).ok().map(|m| m.len()) else {
            return Ok(None);
        };
        if bytes < MIN_FILE_BYTES {
            return Ok(None);
        }
        match read_funding(&path) {
            Ok(rows) => {
                self.touch(&rel)?;
                Ok(Some(rows))
            }
            Err(err) => {
                self.mark_invalid(&rel, &err.to_string());
                Ok(None)
            }
        }
    }

    /// Bookkeeping for `key`, if the index knows about it.
    #[must_use]
    pub fn entry_meta(&self, key: &CacheKey) -> Option<CacheEntryMeta> {
        self.index_guard().get(&key.index_key()).cloned()
    }

    /// Remove the entry for `key`: deletes the data file and drops the index
    /// entry. Removing an absent entry is a no-op.
    pub fn invalidate(&self, key: &CacheKey) -> Result<(), CandelaError> {
        let path = self.root.join(key.relative_path());
        remove_file_if_present(&path)?;
        let mut entries = self.index_guard();
        if entries.remove(&key.index_key()).is_some() {
            self.flush_index(&entries)?;
        }
        Ok(())
    }

    /// Remove every entry written longer than `max_age` ago.
    ///
    /// Both the data files and their index entries are dropped. Returns the
    /// number of entries removed.
    pub fn purge_older_than(&self, max_age: std::time::Duration) -> Result<usize, CandelaError> {
        let max_age = chrono::Duration::from_std(max_age)
            .map_err(|e| CandelaError::validation(format!("max_age out of range: {e}")))?;
        let cutoff = Utc::now() - max_age;
        let mut entries = self.index_guard();
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, meta)| meta.created_at < cutoff)
            .map(|(rel, _)| rel.clone())
            .collect();
        if expired.is_empty() {
            return Ok(0);
        }
        for rel in &expired {
            let path = self.root.join(rel);
            if let Err(err) = remove_file_if_present(&path) {
                self.flush_index(&entries)?;
                return Err(err);
            }
            entries.remove(rel);
        }
        self.flush_index(&entries)?;
        #[cfg(feature = "tracing")]
        tracing::debug!(removed = expired.len(), "purged aged cache entries");
        Ok(expired.len())
    }

    fn touch(&self, rel: &str) -> Result<(), CandelaError> {
        let mut entries = self.index_guard();
        let touched = match entries.get_mut(rel) {
            Some(meta) => {
                meta.last_accessed = Some(Utc::now());
                true
            }
            // Files can predate the index (or survive an index reset);
            // serving them without bookkeeping is fine.
            None => false,
        };
        if touched {
            self.flush_index(&entries)?;
        }
        Ok(())
    }

    fn mark_invalid(&self, rel: &str, reason: &str) {
        #[cfg(feature = "tracing")]
        tracing::warn!(entry = rel, reason, "cache entry poisoned");
        let now = Utc::now();
        let mut entries = self.index_guard();
        let meta = entries
            .entry(rel.to_string())
            .or_insert_with(|| CacheEntryMeta::placeholder(now));
        meta.invalid = true;
        meta.invalid_reason = Some(reason.to_string());
        meta.invalidated_at = Some(now);
        if let Err(_flush) = self.flush_index(&entries) {
            #[cfg(feature = "tracing")]
            tracing::warn!(error = %_flush, "index flush failed; poison mark retained in memory only");
        }
    }

    fn index_guard(&self) -> MutexGuard<'_, HashMap<String, CacheEntryMeta>> {
        self.index.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_frame(&self, path: &Path, df: &mut DataFrame) -> Result<u64, CandelaError> {
        let tmp = path.with_extension("parquet.tmp");
        let file = File::create(&tmp).map_err(|e| io_error(&tmp, &e))?;
        if let Err(err) = ParquetWriter::new(file).finish(df) {
            let _ = fs::remove_file(&tmp);
            return Err(CandelaError::Data(format!(
                "parquet encode at {}: {err}",
                tmp.display()
            )));
        }
        if let Err(err) = fs::rename(&tmp, path) {
            let _ = fs::remove_file(&tmp);
            return Err(io_error(path, &err));
        }
        fs::metadata(path)
            .map(|m| m.len())
            .map_err(|e| io_error(path, &e))
    }

    fn flush_index(&self, entries: &HashMap<String, CacheEntryMeta>) -> Result<(), CandelaError> {
        let raw = serde_json::to_string_pretty(entries)
            .map_err(|e| CandelaError::Data(format!("cache index encode: {e}")))?;
        let path = self.root.join(INDEX_FILE);
        let tmp = self.root.join(INDEX_TMP_FILE);
        fs::write(&tmp, raw).map_err(|e| io_error(&tmp, &e))?;
        fs::rename(&tmp, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            io_error(&path, &e)
        })?;
        Ok(())
    }
}

fn io_error(path: &Path, err: &std::io::Error) -> CandelaError {
    CandelaError::Data(format!("cache io at {}: {err}", path.display()))
}

fn corrupt(path: &Path, reason: impl Into<String>) -> CandelaError {
    CandelaError::cache_corruption(path.display().to_string(), reason)
}

fn remove_file_if_present(path: &Path) -> Result<(), CandelaError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_error(path, &err)),
    }
}

fn candle_frame(rows: &[Candle]) -> Result<DataFrame, CandelaError> {
    let open_time: Vec<i64> = rows.iter().map(|c| c.open_time.timestamp_millis()).collect();
    let open: Vec<f64> = rows.iter().map(|c| c.open).collect();
    let high: Vec<f64> = rows.iter().map(|c| c.high).collect();
    let low: Vec<f64> = rows.iter().map(|c| c.low).collect();
    let close: Vec<f64> = rows.iter().map(|c| c.close).collect();
    let volume: Vec<f64> = rows.iter().map(|c| c.volume).collect();
    let close_time: Vec<i64> = rows
        .iter()
        .map(|c| c.close_time.timestamp_millis())
        .collect();
    let quote_volume: Vec<f64> = rows.iter().map(|c| c.quote_volume).collect();
    let trade_count: Vec<u64> = rows.iter().map(|c| c.trade_count).collect();
    let taker_buy_base: Vec<f64> = rows.iter().map(|c| c.taker_buy_base).collect();
    let taker_buy_quote: Vec<f64> = rows.iter().map(|c| c.taker_buy_quote).collect();

    DataFrame::new(vec![
        Column::new("open_time_ms".into(), open_time),
        Column::new("open".into(), open),
        Column::new("high".into(), high),
        Column::new("low".into(), low),
        Column::new("close".into(), close),
        Column::new("volume".into(), volume),
        Column::new("close_time_ms".into(), close_time),
        Column::new("quote_volume".into(), quote_volume),
        Column::new("trade_count".into(), trade_count),
        Column::new("taker_buy_base".into(), taker_buy_base),
        Column::new("taker_buy_quote".into(), taker_buy_quote),
    ])
    .map_err(|e| CandelaError::Data(format!("candle frame: {e}")))
}

fn funding_frame(rows: &[FundingRate]) -> Result<DataFrame, CandelaError> {
    let funding_time: Vec<i64> = rows
        .iter()
        .map(|r| r.funding_time.timestamp_millis())
        .collect();
    let funding_rate: Vec<f64> = rows.iter().map(|r| r.funding_rate).collect();
    let mark_price: Vec<Option<f64>> = rows.iter().map(|r| r.mark_price).collect();

    DataFrame::new(vec![
        Column::new("funding_time_ms".into(), funding_time),
        Column::new("funding_rate".into(), funding_rate),
        Column::new("mark_price".into(), mark_price),
    ])
    .map_err(|e| CandelaError::Data(format!("funding frame: {e}")))
}

fn read_candles(path: &Path) -> Result<Vec<Candle>, CandelaError> {
    let file = File::open(path).map_err(|e| io_error(path, &e))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| corrupt(path, e.to_string()))?;
    decode_candles(&df, path)
}

fn read_funding(path: &Path) -> Result<Vec<FundingRate>, CandelaError> {
    let file = File::open(path).map_err(|e| io_error(path, &e))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| corrupt(path, e.to_string()))?;
    decode_funding(&df, path)
}

fn decode_candles(df: &DataFrame, path: &Path) -> Result<Vec<Candle>, CandelaError> {
    ensure_columns(df, &CANDLE_COLUMNS, path)?;
    let open_time = col_i64(df, "open_time_ms", path)?;
    let open = col_f64(df, "open", path)?;
    let high = col_f64(df, "high", path)?;
    let low = col_f64(df, "low", path)?;
    let close = col_f64(df, "close", path)?;
    let volume = col_f64(df, "volume", path)?;
    let close_time = col_i64(df, "close_time_ms", path)?;
    let quote_volume = col_f64(df, "quote_volume", path)?;
    let trade_count = col_u64(df, "trade_count", path)?;
    let taker_buy_base = col_f64(df, "taker_buy_base", path)?;
    let taker_buy_quote = col_f64(df, "taker_buy_quote", path)?;

    let mut out = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        out.push(Candle {
            open_time: required_ms(open_time.get(i), "open_time_ms", i, path)?,
            close_time: required_ms(close_time.get(i), "close_time_ms", i, path)?,
            open: required(open.get(i), "open", i, path)?,
            high: required(high.get(i), "high", i, path)?,
            low: required(low.get(i), "low", i, path)?,
            close: required(close.get(i), "close", i, path)?,
            volume: required(volume.get(i), "volume", i, path)?,
            quote_volume: required(quote_volume.get(i), "quote_volume", i, path)?,
            trade_count: required(trade_count.get(i), "trade_count", i, path)?,
            taker_buy_base: required(taker_buy_base.get(i), "taker_buy_base", i, path)?,
            taker_buy_quote: required(taker_buy_quote.get(i), "taker_buy_quote", i, path)?,
            source: DataSource::Cache,
        });
    }
    Ok(out)
}

fn decode_funding(df: &DataFrame, path: &Path) -> Result<Vec<FundingRate>, CandelaError> {
    ensure_columns(df, &FUNDING_COLUMNS, path)?;
    let funding_time = col_i64(df, "funding_time_ms", path)?;
    let funding_rate = col_f64(df, "funding_rate", path)?;
    let mark_price = col_f64(df, "mark_price", path)?;

    let mut out = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        out.push(FundingRate {
            funding_time: required_ms(funding_time.get(i), "funding_time_ms", i, path)?,
            funding_rate: required(funding_rate.get(i), "funding_rate", i, path)?,
            mark_price: mark_price.get(i),
            source: DataSource::Cache,
        });
    }
    Ok(out)
}

fn ensure_columns(df: &DataFrame, expected: &[&str], path: &Path) -> Result<(), CandelaError> {
    if df.height() == 0 {
        return Err(corrupt(path, "file holds zero rows"));
    }
    for name in expected {
        if df.column(name).is_err() {
            return Err(corrupt(path, format!("missing column {name}")));
        }
    }
    Ok(())
}

fn col_i64<'a>(df: &'a DataFrame, name: &str, path: &Path) -> Result<&'a Int64Chunked, CandelaError> {
    df.column(name)
        .and_then(Column::i64)
        .map_err(|e| corrupt(path, format!("column {name}: {e}")))
}

fn col_f64<'a>(df: &'a DataFrame, name: &str, path: &Path) -> Result<&'a Float64Chunked, CandelaError> {
    df.column(name)
        .and_then(Column::f64)
        .map_err(|e| corrupt(path, format!("column {name}: {e}")))
}

fn col_u64<'a>(df: &'a DataFrame, name: &str, path: &Path) -> Result<&'a UInt64Chunked, CandelaError> {
    df.column(name)
        .and_then(Column::u64)
        .map_err(|e| corrupt(path, format!("column {name}: {e}")))
}

fn required<T>(value: Option<T>, column: &str, row: usize, path: &Path) -> Result<T, CandelaError> {
    value.ok_or_else(|| corrupt(path, format!("null {column} at row {row}")))
}

fn required_ms(
    value: Option<i64>,
    column: &str,
    row: usize,
    path: &Path,
) -> Result<DateTime<Utc>, CandelaError> {
    let ms = required(value, column, row, path)?;
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| corrupt(path, format!("{column} value {ms} out of range at row {row}")))
}
