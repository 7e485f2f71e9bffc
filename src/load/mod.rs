//! Batch loading: cleaned records into the destination table.
//!
//! [`BatchLoader::load`] projects a [`DataSet`] into the table's fixed column order and inserts
//! it inside one transaction, in pages of [`LoaderOptions::page_size`] rows. Rows whose key
//! already exists are skipped ("on conflict do nothing"), rows without a key are never sent.
//! If any page fails the transaction is rolled back; committing is left to the caller so the
//! whole run lands or nothing does.
//!
//! Before projecting, the loader asks the connection to describe the live table
//! ([`StoreConnection::describe_table`]), so an INTEGER `member_id` or an enum status column binds
//! as what the table actually holds rather than the catalogue's default.
//!
//! Stores implement [`Store`] / [`StoreConnection`]:
//!
//! - [`postgres::PostgresStore`]: PostgreSQL via the `postgres` crate
//! - [`memory::MemoryStore`]: in-process table with the same semantics

pub mod memory;
pub mod postgres;

use tracing::warn;

use crate::cleaning::parse::{parse_datetime, parse_decimal};
use crate::columns::{SqlType, TableSpec};
use crate::error::{SyncError, SyncResult};
use crate::types::{DataSet, Value};

pub use self::memory::{MemoryConnection, MemoryStore};
pub use self::postgres::{PostgresConnection, PostgresStore};

/// Default rows per `INSERT` statement.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// PostgreSQL's limit on bind parameters per statement; pages are capped to fit.
pub const MAX_BIND_PARAMS: usize = 65_535;

/// A destination that hands out one connection per run.
pub trait Store {
    type Connection: StoreConnection;

    /// Open a connection. Dropping it releases it; an open transaction is abandoned.
    fn connect(&self) -> SyncResult<Self::Connection>;
}

/// One open store connection.
pub trait StoreConnection {
    /// `table` with each column's binding adjusted to the live destination.
    fn describe_table(&mut self, table: &TableSpec) -> SyncResult<TableSpec> {
        Ok(table.clone())
    }

    fn begin(&mut self) -> SyncResult<()>;

    /// Insert `rows` (already in `table` column order), skipping existing keys.
    ///
    /// Returns the number of rows actually inserted.
    fn insert_page(&mut self, table: &TableSpec, rows: &[Vec<Value>]) -> SyncResult<u64>;

    fn commit(&mut self) -> SyncResult<()>;

    fn rollback(&mut self) -> SyncResult<()>;
}

/// Options controlling batch loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderOptions {
    /// Rows per `INSERT` statement. Clamped to at least 1 and to what fits [`MAX_BIND_PARAMS`].
    pub page_size: usize,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Counts from one load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    /// Rows sent to the store.
    pub attempted: usize,
    /// Rows the store inserted.
    pub inserted: usize,
    /// Rows dropped before sending because the key was blank.
    pub skipped_missing_key: usize,
}

impl LoadStats {
    /// Rows skipped because their key already existed.
    pub fn skipped_conflict(&self) -> usize {
        self.attempted.saturating_sub(self.inserted)
    }
}

/// Records projected into table column order.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub rows: Vec<Vec<Value>>,
    pub skipped_missing_key: usize,
}

/// Projects and inserts cleaned records.
#[derive(Debug, Clone)]
pub struct BatchLoader {
    table: TableSpec,
    options: LoaderOptions,
}

impl BatchLoader {
    pub fn new(table: TableSpec, options: LoaderOptions) -> Self {
        Self { table, options }
    }

    pub fn table(&self) -> &TableSpec {
        &self.table
    }

    /// Map each record to the table's column order, coercing values to the column SQL types.
    ///
    /// Columns absent from the dataset become NULL. Records with a NULL key are dropped.
    pub fn project(&self, dataset: &DataSet) -> Projection {
        project_into(&self.table, dataset)
    }

    /// Begin a transaction on `conn` and insert every record of `dataset`.
    ///
    /// On error the transaction is rolled back. On success it is left open for the caller to
    /// commit.
    pub fn load<C>(&self, conn: &mut C, dataset: &DataSet) -> SyncResult<LoadStats>
    where
        C: StoreConnection + ?Sized,
    {
        if self.table.key_index().is_none() {
            return Err(SyncError::config(format!(
                "conflict key '{}' is not a column of table '{}'",
                self.table.key, self.table.name
            )));
        }

        let table = conn.describe_table(&self.table)?;
        let projection = project_into(&table, dataset);
        conn.begin()?;

        let width = table.columns.len().max(1);
        let page_size = self.options.page_size.clamp(1, MAX_BIND_PARAMS / width);

        let mut inserted: u64 = 0;
        for page in projection.rows.chunks(page_size) {
            match conn.insert_page(&table, page) {
                Ok(n) => inserted += n,
                Err(e) => {
                    if let Err(rollback_err) = conn.rollback() {
                        warn!(error = %rollback_err, "rollback after failed insert also failed");
                    }
                    return Err(e);
                }
            }
        }

        Ok(LoadStats {
            attempted: projection.rows.len(),
            inserted: usize::try_from(inserted).unwrap_or(usize::MAX),
            skipped_missing_key: projection.skipped_missing_key,
        })
    }
}

fn project_into(table: &TableSpec, dataset: &DataSet) -> Projection {
    let sources: Vec<Option<usize>> = table
        .columns
        .iter()
        .map(|c| dataset.schema.index_of(&c.name))
        .collect();
    let key_idx = table.key_index();

    let mut rows = Vec::with_capacity(dataset.row_count());
    let mut skipped_missing_key = 0;
    for record in &dataset.rows {
        let row: Vec<Value> = table
            .columns
            .iter()
            .zip(sources.iter())
            .map(|(col, src)| {
                let value = src
                    .and_then(|i| record.get(i))
                    .cloned()
                    .unwrap_or(Value::Null);
                coerce(value, col.sql_type)
            })
            .collect();

        match key_idx {
            Some(k) if row[k].is_null() => skipped_missing_key += 1,
            _ => rows.push(row),
        }
    }

    Projection {
        rows,
        skipped_missing_key,
    }
}

/// Convert a cleaned value to the representation a column of `sql_type` binds.
///
/// Fractions bound as `BIGINT` are rounded half away from zero, the way PostgreSQL assigns a
/// numeric to an integer column. Values that cannot be represented become [`Value::Null`].
pub fn coerce(value: Value, sql_type: SqlType) -> Value {
    match (value, sql_type) {
        (Value::Null, _) => Value::Null,

        (v @ Value::Utf8(_), SqlType::Text) => v,
        (Value::Int64(i), SqlType::Text) => Value::Utf8(i.to_string()),
        (Value::Float64(f), SqlType::Text) => Value::Utf8(f.to_string()),
        (Value::Timestamp(t), SqlType::Text) => {
            Value::Utf8(t.format("%Y-%m-%d %H:%M:%S").to_string())
        }

        (v @ Value::Int64(_), SqlType::BigInt) => v,
        (Value::Float64(f), SqlType::BigInt) => round_to_int(f),
        (Value::Utf8(s), SqlType::BigInt) => parse_decimal(&s).map_or(Value::Null, round_to_int),

        (v @ Value::Float64(_), SqlType::DoublePrecision) => v,
        (Value::Int64(i), SqlType::DoublePrecision) => Value::Float64(i as f64),
        (Value::Utf8(s), SqlType::DoublePrecision) => {
            parse_decimal(&s).map(Value::Float64).unwrap_or(Value::Null)
        }

        (v @ Value::Timestamp(_), SqlType::Timestamp) => v,
        (Value::Utf8(s), SqlType::Timestamp) => {
            parse_datetime(&s).map(Value::Timestamp).unwrap_or(Value::Null)
        }

        (Value::Timestamp(_), _) | (_, SqlType::Timestamp) => Value::Null,
    }
}

fn round_to_int(f: f64) -> Value {
    let rounded = f.round();
    if rounded.is_finite() && rounded >= i64::MIN as f64 && rounded < i64::MAX as f64 {
        Value::Int64(rounded as i64)
    } else {
        Value::Null
    }
}
