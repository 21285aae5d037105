//! # Stockpipe Warehouse
//!
//! Destination store for stock observations.
//!
//! ## Overview
//!
//! The ingestion pipeline talks to storage only through [`ObservationStore`].
//! Two implementations ship with this crate:
//!
//! - [`Warehouse`]: `DuckDB`-backed, pooled connections, versioned migrations.
//! - [`MemoryStore`]: in-process map, used for dry runs and tests.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use stockpipe_warehouse::{ObservationRow, ObservationStore, Warehouse};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let warehouse = Warehouse::open_default()?;
//!
//!     let id = warehouse.insert(&ObservationRow {
//!         trade_code: "ACI".to_string(),
//!         date: "2020-01-02".to_string(),
//!         open: 230.1,
//!         high: 233.0,
//!         low: 229.5,
//!         close: 232.4,
//!         volume: 1_234_567,
//!     })?;
//!
//!     println!("stored as #{id}, {} rows total", warehouse.count()?);
//!     Ok(())
//! }
//! ```
//!
//! ## Tables
//!
//! | Table | Description |
//! |-------|-------------|
//! | `stock_observations` | One row per `(trade_code, date)` |
//! | `ordinal_sequences` | Next ordinal handed out on insert |
//! | `schema_migrations` | Applied migration versions |

pub mod duckdb;
pub mod memory;
pub mod migrations;
pub mod store;

use std::collections::{BTreeSet, HashSet};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use ::duckdb::{params, Connection, ToSql};
use thiserror::Error;

pub use duckdb::{DuckDbConnectionManager, PooledConnection};
pub use memory::MemoryStore;
pub use store::{ObservationQuery, ObservationRow, ObservationStore, StoreError, StoredObservation};

use migrations::OBSERVATION_SEQUENCE;

/// Errors that can occur while opening the warehouse.
#[derive(Debug, Error)]
pub enum WarehouseError {
    /// `DuckDB` database error.
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    /// I/O error (file system operations).
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<WarehouseError> for StoreError {
    fn from(error: WarehouseError) -> Self {
        StoreError::Unavailable(error.to_string())
    }
}

/// Configuration for the warehouse database.
#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    /// Root directory for stockpipe data.
    pub stockpipe_home: PathBuf,
    /// Path to the `DuckDB` database file.
    pub db_path: PathBuf,
    /// Maximum number of idle connections kept in the pool.
    pub max_pool_size: usize,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self::with_home(resolve_stockpipe_home())
    }
}

impl WarehouseConfig {
    /// Configuration rooted at `stockpipe_home`, database at `<home>/warehouse.duckdb`.
    pub fn with_home(stockpipe_home: impl Into<PathBuf>) -> Self {
        let stockpipe_home = stockpipe_home.into();
        let db_path = stockpipe_home.join("warehouse.duckdb");
        Self {
            stockpipe_home,
            db_path,
            max_pool_size: 4,
        }
    }
}

/// `DuckDB`-backed observation store.
///
/// Clones share the connection pool and the write lock, so writes from any
/// clone in this process are serialized.
#[derive(Clone)]
pub struct Warehouse {
    manager: DuckDbConnectionManager,
    write_lock: Arc<Mutex<()>>,
}

impl Warehouse {
    /// Open a warehouse with default configuration.
    pub fn open_default() -> Result<Self, WarehouseError> {
        Self::open(WarehouseConfig::default())
    }

    /// Open a warehouse with the specified configuration.
    pub fn open(config: WarehouseConfig) -> Result<Self, WarehouseError> {
        if let Some(parent) = config.db_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let manager = DuckDbConnectionManager::open(config.db_path.clone(), config.max_pool_size)?;
        let warehouse = Self {
            manager,
            write_lock: Arc::new(Mutex::new(())),
        };
        warehouse.initialize()?;
        tracing::debug!(db_path = %warehouse.db_path().display(), "warehouse opened");
        Ok(warehouse)
    }

    /// Initialize database schema.
    pub fn initialize(&self) -> Result<(), WarehouseError> {
        let connection = self.manager.acquire()?;
        migrations::apply_migrations(&connection)?;
        Ok(())
    }

    /// Get the path to the database file.
    pub fn db_path(&self) -> &Path {
        self.manager.db_path()
    }

    fn lock_writes(&self) -> Result<MutexGuard<'_, ()>, StoreError> {
        self.write_lock
            .lock()
            .map_err(|_| StoreError::Unavailable(String::from("warehouse write lock poisoned")))
    }

    fn connection(&self) -> Result<PooledConnection, StoreError> {
        self.manager
            .acquire()
            .map_err(|error| StoreError::Unavailable(error.to_string()))
    }
}

impl ObservationStore for Warehouse {
    fn exists_by_key(&self, trade_code: &str, date: &str) -> Result<bool, StoreError> {
        let connection = self.connection()?;
        let count: i64 = connection
            .query_row(
                "SELECT COUNT(*) FROM stock_observations \
                 WHERE trade_code = ? AND date = TRY_CAST(? AS DATE)",
                params![trade_code, date],
                |row| row.get(0),
            )
            .map_err(|error| classify_error(error, None))?;
        Ok(count > 0)
    }

    fn existing_keys(&self, trade_codes: &[String]) -> Result<HashSet<(String, String)>, StoreError> {
        let connection = self.connection()?;
        let mut statement = connection
            .prepare(
                "SELECT trade_code, CAST(date AS VARCHAR) FROM stock_observations \
                 WHERE trade_code = ?",
            )
            .map_err(|error| classify_error(error, None))?;

        let mut keys = HashSet::new();
        for trade_code in trade_codes {
            let rows = statement
                .query_map(params![trade_code], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })
                .map_err(|error| classify_error(error, None))?;
            for key in rows {
                keys.insert(key.map_err(|error| classify_error(error, None))?);
            }
        }
        Ok(keys)
    }

    fn insert(&self, row: &ObservationRow) -> Result<i64, StoreError> {
        let _writes = self.lock_writes()?;
        let connection = self.connection()?;
        begin_transaction(&connection)?;
        let result = (|| -> Result<i64, ::duckdb::Error> {
            let id = next_ordinal(&connection)?;
            insert_row(&connection, id, row)?;
            store_next_ordinal(&connection, id + 1)?;
            Ok(id)
        })()
        .map_err(|error| classify_error(error, Some(row)));

        finalize_transaction(&connection, result, Some(row))
    }

    fn insert_many(&self, rows: &[ObservationRow]) -> Result<usize, StoreError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let _writes = self.lock_writes()?;
        let connection = self.connection()?;
        begin_transaction(&connection)?;
        let result = (|| -> Result<usize, StoreError> {
            let first = next_ordinal(&connection).map_err(|error| classify_error(error, None))?;
            let mut id = first;
            for row in rows {
                insert_row(&connection, id, row).map_err(|error| classify_error(error, Some(row)))?;
                id += 1;
            }
            store_next_ordinal(&connection, id).map_err(|error| classify_error(error, None))?;
            Ok(rows.len())
        })();

        finalize_transaction(&connection, result, None)
    }

    fn delete_all(&self) -> Result<usize, StoreError> {
        let _writes = self.lock_writes()?;
        let connection = self.connection()?;
        connection
            .execute("DELETE FROM stock_observations", [])
            .map_err(|error| classify_error(error, None))
    }

    fn reset_ordinal_sequence(&self) -> Result<(), StoreError> {
        let _writes = self.lock_writes()?;
        let connection = self.connection()?;
        store_next_ordinal(&connection, 1).map_err(|error| classify_error(error, None))
    }

    fn count(&self) -> Result<usize, StoreError> {
        let connection = self.connection()?;
        let count: i64 = connection
            .query_row("SELECT COUNT(*) FROM stock_observations", [], |row| row.get(0))
            .map_err(|error| classify_error(error, None))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    fn distinct_trade_codes(&self) -> Result<BTreeSet<String>, StoreError> {
        let connection = self.connection()?;
        let mut statement = connection
            .prepare("SELECT DISTINCT trade_code FROM stock_observations")
            .map_err(|error| classify_error(error, None))?;
        let codes = statement
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|error| classify_error(error, None))?
            .collect::<Result<BTreeSet<_>, _>>()
            .map_err(|error| classify_error(error, None))?;
        Ok(codes)
    }

    fn list(&self, query: &ObservationQuery) -> Result<Vec<StoredObservation>, StoreError> {
        let connection = self.connection()?;

        // limit/offset are integers, only the trade code is user text
        let mut sql = String::from(
            "SELECT id, trade_code, CAST(date AS VARCHAR), open, high, low, close, volume \
             FROM stock_observations",
        );
        let mut params: Vec<&dyn ToSql> = Vec::new();
        if let Some(trade_code) = &query.trade_code {
            sql.push_str(" WHERE trade_code = ?");
            params.push(trade_code);
        }
        sql.push_str(" ORDER BY date DESC, trade_code ASC");
        if let Some(limit) = query.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if query.offset > 0 {
            sql.push_str(&format!(" OFFSET {}", query.offset));
        }

        let mut statement = connection
            .prepare(sql.as_str())
            .map_err(|error| classify_error(error, None))?;
        let rows = statement
            .query_map(params.as_slice(), |row| {
                Ok(StoredObservation {
                    id: row.get(0)?,
                    row: ObservationRow {
                        trade_code: row.get(1)?,
                        date: row.get(2)?,
                        open: row.get(3)?,
                        high: row.get(4)?,
                        low: row.get(5)?,
                        close: row.get(6)?,
                        volume: row.get(7)?,
                    },
                })
            })
            .map_err(|error| classify_error(error, None))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|error| classify_error(error, None))?;
        Ok(rows)
    }
}

fn begin_transaction(connection: &Connection) -> Result<(), StoreError> {
    connection
        .execute_batch("BEGIN TRANSACTION")
        .map_err(|error| classify_error(error, None))
}

/// Finalize a transaction, committing on success or rolling back on failure.
fn finalize_transaction<T>(
    connection: &Connection,
    result: Result<T, StoreError>,
    row: Option<&ObservationRow>,
) -> Result<T, StoreError> {
    match result {
        Ok(value) => {
            if let Err(error) = connection.execute_batch("COMMIT") {
                let _ = connection.execute_batch("ROLLBACK");
                return Err(classify_error(error, row));
            }
            Ok(value)
        }
        Err(error) => {
            let _ = connection.execute_batch("ROLLBACK");
            Err(error)
        }
    }
}

fn next_ordinal(connection: &Connection) -> Result<i64, ::duckdb::Error> {
    connection.query_row(
        "SELECT next_value FROM ordinal_sequences WHERE name = ?",
        params![OBSERVATION_SEQUENCE],
        |row| row.get(0),
    )
}

fn store_next_ordinal(connection: &Connection, next_value: i64) -> Result<(), ::duckdb::Error> {
    connection.execute(
        "UPDATE ordinal_sequences SET next_value = ? WHERE name = ?",
        params![next_value, OBSERVATION_SEQUENCE],
    )?;
    Ok(())
}

fn insert_row(connection: &Connection, id: i64, row: &ObservationRow) -> Result<(), ::duckdb::Error> {
    let params: [&dyn ToSql; 8] = [
        &id,
        &row.trade_code,
        &row.date,
        &row.open,
        &row.high,
        &row.low,
        &row.close,
        &row.volume,
    ];
    connection.execute(
        "INSERT INTO stock_observations \
         (id, trade_code, date, open, high, low, close, volume) \
         VALUES (?, ?, CAST(? AS DATE), ?, ?, ?, ?, ?)",
        params.as_slice(),
    )?;
    Ok(())
}

/// Map a `DuckDB` failure onto the store error taxonomy.
fn classify_error(error: ::duckdb::Error, row: Option<&ObservationRow>) -> StoreError {
    let message = error.to_string();
    if is_constraint_violation(&message) {
        let key = row.map_or_else(|| message.clone(), ObservationRow::describe_key);
        return StoreError::Conflict { key };
    }
    if message.contains("IO Error") || message.contains("Connection Error") {
        return StoreError::Unavailable(message);
    }
    StoreError::Backend(message)
}

fn is_constraint_violation(message: &str) -> bool {
    message.contains("Constraint Error")
        || message.contains("Duplicate key")
        || message.contains("violates unique constraint")
        || message.contains("violates primary key constraint")
}

/// Resolve the stockpipe home directory from environment or default.
fn resolve_stockpipe_home() -> PathBuf {
    if let Some(path) = env::var_os("STOCKPIPE_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".stockpipe");
    }

    PathBuf::from(".stockpipe")
}
