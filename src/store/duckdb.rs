//! Embedded DuckDB store.

use std::path::Path;
use std::time::Instant;

use duckdb::{AccessMode, Config, Connection};
use tracing::debug_span;

use crate::types::Value;

use super::{Store, StoreError, StoreTransaction};

const TABLE_EXISTS_SQL: &str = "SELECT count(*) FROM information_schema.tables \
     WHERE table_schema = current_schema() AND lower(table_name) = lower(?)";

/// A [`Store`] over a single DuckDB connection.
///
/// DuckDB DDL is transactional, so a rolled-back load leaves neither the table nor its id
/// sequence behind.
pub struct DuckDbStore {
    conn: Connection,
}

impl std::fmt::Debug for DuckDbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuckDbStore").finish_non_exhaustive()
    }
}

impl DuckDbStore {
    /// Open (or create) a database file. Missing parent directories are created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Database(format!(
                    "failed to create database directory {}: {e}",
                    parent.display()
                ))
            })?;
        }
        let conn = Connection::open(path).map_err(classify)?;
        tracing::info!(path = %path.display(), "opened duckdb store");
        Ok(Self { conn })
    }

    /// A private in-memory database.
    pub fn memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(classify)?;
        Ok(Self { conn })
    }

    /// Run a query and return every row. Intended for inspection and tests.
    pub fn query_rows(&self, sql: &str) -> Result<Vec<Vec<Value>>, StoreError> {
        let mut stmt = self.conn.prepare(sql).map_err(classify)?;
        let mut rows = stmt.query([]).map_err(classify)?;
        let column_count = rows.as_ref().map(|s| s.column_count()).unwrap_or(0);

        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(classify)? {
            let mut values = Vec::with_capacity(column_count);
            for idx in 0..column_count {
                values.push(decode(row, idx).map_err(classify)?);
            }
            out.push(values);
        }
        Ok(out)
    }

    /// Execute a batch of statements outside any load transaction.
    pub fn execute_batch(&self, sql: &str) -> Result<(), StoreError> {
        self.conn.execute_batch(sql).map_err(classify)
    }
}

impl Store for DuckDbStore {
    fn table_exists(&mut self, name: &str) -> Result<bool, StoreError> {
        table_exists_on(&self.conn, name)
    }

    fn begin(&mut self) -> Result<Box<dyn StoreTransaction + '_>, StoreError> {
        self.conn
            .execute_batch("BEGIN TRANSACTION")
            .map_err(|e| StoreError::Transaction(e.to_string()))?;
        Ok(Box::new(DuckDbTransaction {
            conn: &self.conn,
            finished: false,
        }))
    }
}

struct DuckDbTransaction<'a> {
    conn: &'a Connection,
    finished: bool,
}

impl StoreTransaction for DuckDbTransaction<'_> {
    fn table_exists(&mut self, name: &str) -> Result<bool, StoreError> {
        table_exists_on(self.conn, name)
    }

    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, StoreError> {
        let op = sql.split_whitespace().next().unwrap_or("unknown");
        let span = debug_span!(
            "db.exec",
            op = op,
            params = params.len(),
            duration_ms = tracing::field::Empty
        );
        let _guard = span.enter();
        let start = Instant::now();

        let mut stmt = self.conn.prepare(sql).map_err(classify)?;
        let bound = to_duckdb_params(params);
        let refs: Vec<&dyn duckdb::ToSql> =
            bound.iter().map(|v| v as &dyn duckdb::ToSql).collect();
        let rows = stmt.execute(refs.as_slice()).map_err(classify)?;

        span.record("duration_ms", start.elapsed().as_millis() as u64);
        Ok(rows as u64)
    }

    fn commit(mut self: Box<Self>) -> Result<(), StoreError> {
        self.finished = true;
        self.conn
            .execute_batch("COMMIT")
            .map_err(|e| StoreError::Transaction(format!("commit failed: {e}")))
    }

    fn rollback(mut self: Box<Self>) -> Result<(), StoreError> {
        self.finished = true;
        self.conn
            .execute_batch("ROLLBACK")
            .map_err(|e| StoreError::Transaction(format!("rollback failed: {e}")))
    }
}

impl Drop for DuckDbTransaction<'_> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                tracing::warn!(error = %e, "implicit rollback failed");
            }
        }
    }
}

fn table_exists_on(conn: &Connection, name: &str) -> Result<bool, StoreError> {
    let count: i64 = conn
        .query_row(TABLE_EXISTS_SQL, [name], |row| row.get(0))
        .map_err(classify)?;
    Ok(count > 0)
}

fn classify(err: duckdb::Error) -> StoreError {
    let message = err.to_string();
    if message.contains("already exists") {
        StoreError::AlreadyExists(message)
    } else {
        StoreError::Database(message)
    }
}

fn to_duckdb_params(params: &[Value]) -> Vec<duckdb::types::Value> {
    params
        .iter()
        .map(|p| match p {
            Value::Null => duckdb::types::Value::Null,
            Value::Int64(v) => duckdb::types::Value::BigInt(*v),
            Value::Float64(v) => duckdb::types::Value::Double(*v),
            Value::Bool(v) => duckdb::types::Value::Boolean(*v),
            Value::Utf8(v) => duckdb::types::Value::Text(v.clone()),
            Value::Json(v) => duckdb::types::Value::Text(v.to_string()),
        })
        .collect()
}

fn decode(row: &duckdb::Row<'_>, idx: usize) -> duckdb::Result<Value> {
    use duckdb::types::ValueRef;

    Ok(match row.get_ref(idx)? {
        ValueRef::Null => Value::Null,
        ValueRef::Boolean(v) => Value::Bool(v),
        ValueRef::TinyInt(v) => Value::Int64(v as i64),
        ValueRef::SmallInt(v) => Value::Int64(v as i64),
        ValueRef::Int(v) => Value::Int64(v as i64),
        ValueRef::BigInt(v) => Value::Int64(v),
        ValueRef::HugeInt(v) => Value::Int64(v as i64),
        ValueRef::UTinyInt(v) => Value::Int64(v as i64),
        ValueRef::USmallInt(v) => Value::Int64(v as i64),
        ValueRef::UInt(v) => Value::Int64(v as i64),
        ValueRef::UBigInt(v) => Value::Int64(v as i64),
        ValueRef::Float(v) => Value::Float64(v as f64),
        ValueRef::Double(v) => Value::Float64(v),
        ValueRef::Text(v) => Value::Utf8(String::from_utf8_lossy(v).into_owned()),
        other => Value::Utf8(format!("{other:?}")),
    })
}

/// Double-quote an identifier, escaping embedded quotes.
pub(crate) fn quote_ident(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len() + 2);
    escaped.push('"');
    for ch in name.chars() {
        if ch == '"' {
            escaped.push('"');
        }
        escaped.push(ch);
    }
    escaped.push('"');
    escaped
}

/// Open an existing database file without write access.
pub(crate) fn read_only_connection(path: &Path) -> duckdb::Result<Connection> {
    let config = Config::default().access_mode(AccessMode::ReadOnly)?;
    Connection::open_with_flags(path, config)
}
