//! Store contract shared by every destination engine.
//!
//! The pipeline never reaches a store through global state: each operation
//! receives a `&dyn ObservationStore` and re-reads whatever it needs.

use std::collections::{BTreeSet, HashSet};

use serde::Serialize;
use thiserror::Error;

/// Flat observation row as persisted by a store.
///
/// `date` is the canonical `YYYY-MM-DD` form; the ordinal is not part of the
/// row because the store assigns it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObservationRow {
    pub trade_code: String,
    pub date: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl ObservationRow {
    pub fn key(&self) -> (String, String) {
        (self.trade_code.clone(), self.date.clone())
    }

    /// Human-readable business key, e.g. `ACI @ 2020-01-02`.
    pub fn describe_key(&self) -> String {
        format!("{} @ {}", self.trade_code, self.date)
    }
}

/// A row together with the ordinal the store assigned on insert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredObservation {
    pub id: i64,
    #[serde(flatten)]
    pub row: ObservationRow,
}

/// Listing filter. Results are ordered newest date first, then by trade code.
#[derive(Debug, Clone, Default)]
pub struct ObservationQuery {
    pub trade_code: Option<String>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl ObservationQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_trade_code(trade_code: impl Into<String>) -> Self {
        Self {
            trade_code: Some(trade_code.into()),
            ..Self::default()
        }
    }
}

/// Errors surfaced by a store implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The `(trade_code, date)` pair is already present.
    #[error("observation {key} already exists")]
    Conflict { key: String },

    /// The store could not be reached or opened.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Any other engine failure.
    #[error("store error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Only uniqueness conflicts are recoverable for a single row.
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Keyed store of stock observations.
///
/// Implementations must enforce `(trade_code, date)` uniqueness themselves;
/// callers do not assume they are the sole writer.
pub trait ObservationStore: Send + Sync {
    /// Whether an observation with this business key exists.
    fn exists_by_key(&self, trade_code: &str, date: &str) -> Result<bool, StoreError>;

    /// Business keys already stored for the given trade codes.
    fn existing_keys(&self, trade_codes: &[String]) -> Result<HashSet<(String, String)>, StoreError>;

    /// Insert one row, returning the assigned ordinal.
    fn insert(&self, row: &ObservationRow) -> Result<i64, StoreError>;

    /// Insert every row or none of them.
    fn insert_many(&self, rows: &[ObservationRow]) -> Result<usize, StoreError>;

    /// Delete every observation, returning how many were removed.
    fn delete_all(&self) -> Result<usize, StoreError>;

    /// Make the next assigned ordinal 1.
    fn reset_ordinal_sequence(&self) -> Result<(), StoreError>;

    fn count(&self) -> Result<usize, StoreError>;

    fn distinct_trade_codes(&self) -> Result<BTreeSet<String>, StoreError>;

    fn list(&self, query: &ObservationQuery) -> Result<Vec<StoredObservation>, StoreError>;
}
