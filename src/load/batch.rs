//! Chunked multi-row inserts.

use crate::error::{IngestionError, IngestionResult};
use crate::store::duckdb::quote_ident;
use crate::store::StoreTransaction;
use crate::types::{ResolvedColumn, Value};

use super::schema::TableDefinition;

/// Rows per insert statement unless configured otherwise.
pub const DEFAULT_BATCH_SIZE: usize = 1_000;

/// Emit an `info` progress event each time this many more rows are inserted.
const PROGRESS_EVERY: u64 = 5_000;

/// Counters for a completed batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub rows_inserted: u64,
    pub batches: usize,
}

/// Map each selected column to its position in the source header list.
pub fn project(headers: &[String], columns: &[ResolvedColumn]) -> IngestionResult<Vec<usize>> {
    columns
        .iter()
        .map(|c| {
            headers.iter().position(|h| h == &c.name).ok_or_else(|| {
                IngestionError::validation(format!("column '{}' not found in source", c.name))
            })
        })
        .collect()
}

/// Streams rows into a table in fixed-size chunks, one parameterized statement per chunk.
///
/// At most one batch of parameters is held in memory.
#[derive(Debug)]
pub struct BatchLoader<'a> {
    table: &'a TableDefinition,
    batch_size: usize,
    full_batch_sql: String,
}

impl<'a> BatchLoader<'a> {
    /// `batch_size` of zero is treated as one.
    pub fn new(table: &'a TableDefinition, batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        let mut loader = Self {
            table,
            batch_size,
            full_batch_sql: String::new(),
        };
        loader.full_batch_sql = loader.insert_sql(batch_size);
        loader
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// `INSERT INTO "t" ("a", "b") VALUES (?, ?), (?, ?)` for `rows` rows.
    pub fn insert_sql(&self, rows: usize) -> String {
        let columns = self
            .table
            .columns
            .iter()
            .map(|c| quote_ident(&c.name))
            .collect::<Vec<_>>()
            .join(", ");
        let tuple = format!("({})", vec!["?"; self.table.columns.len()].join(", "));
        let values = vec![tuple.as_str(); rows].join(", ");
        format!(
            "INSERT INTO {} ({columns}) VALUES {values}",
            quote_ident(&self.table.name)
        )
    }

    /// Insert every row of `rows`, picking cells by `projection`.
    ///
    /// `on_flush` receives the number of rows inserted so far after each batch.
    pub fn load<I, F>(
        &self,
        tx: &mut dyn StoreTransaction,
        rows: I,
        projection: &[usize],
        mut on_flush: F,
    ) -> IngestionResult<BatchStats>
    where
        I: Iterator<Item = IngestionResult<Vec<Value>>>,
        F: FnMut(u64),
    {
        let width = self.table.columns.len();
        let mut params: Vec<Value> = Vec::with_capacity(self.batch_size * width);
        let mut pending = 0usize;
        let mut stats = BatchStats::default();

        for row in rows {
            let row = row?;
            for (column, &idx) in self.table.columns.iter().zip(projection) {
                params.push(bind_cell(row.get(idx), column));
            }
            pending += 1;

            if pending == self.batch_size {
                self.flush(tx, &mut params, pending, &mut stats)?;
                pending = 0;
                on_flush(stats.rows_inserted);
            }
        }
        if pending > 0 {
            self.flush(tx, &mut params, pending, &mut stats)?;
            on_flush(stats.rows_inserted);
        }
        Ok(stats)
    }

    fn flush(
        &self,
        tx: &mut dyn StoreTransaction,
        params: &mut Vec<Value>,
        rows: usize,
        stats: &mut BatchStats,
    ) -> IngestionResult<()> {
        let partial;
        let sql = if rows == self.batch_size {
            &self.full_batch_sql
        } else {
            partial = self.insert_sql(rows);
            &partial
        };

        tx.execute(sql, params).map_err(|e| {
            IngestionError::load_failed(
                &self.table.name,
                format!("batch starting at row {}: {e}", stats.rows_inserted + 1),
            )
        })?;
        params.clear();

        let before = stats.rows_inserted;
        stats.rows_inserted += rows as u64;
        stats.batches += 1;

        tracing::debug!(
            table = %self.table.name,
            batch = stats.batches,
            rows,
            "flushed batch"
        );
        if stats.rows_inserted / PROGRESS_EVERY > before / PROGRESS_EVERY {
            tracing::info!(
                table = %self.table.name,
                rows = stats.rows_inserted,
                "load progress"
            );
        }
        Ok(())
    }
}

/// Convert one source cell for binding into `column`.
///
/// Missing cells bind NULL. Empty strings bind NULL for non-text targets. Structured values bind
/// as their JSON text; the conversion is one-way.
fn bind_cell(cell: Option<&Value>, column: &ResolvedColumn) -> Value {
    match cell {
        None | Some(Value::Null) => Value::Null,
        Some(Value::Utf8(s)) if s.is_empty() && !column.backend_type.is_text() => Value::Null,
        Some(Value::Json(json)) => Value::Utf8(json.to_string()),
        Some(other) => other.clone(),
    }
}
