//! Loading a source into a new table.
//!
//! The load path is:
//!
//! 1. [`SchemaBuilder`] sanitizes the table name and lays out the columns (adding a surrogate `id`
//!    key unless the caller selected one).
//! 2. [`TransactionCoordinator`] opens one transaction, checks for a name collision, and runs the
//!    DDL.
//! 3. The source is re-opened in full mode and [`BatchLoader`] inserts it in fixed-size chunks.
//! 4. The transaction commits once. Any failure rolls back everything, including the `CREATE TABLE`.

pub mod batch;
pub mod schema;
pub mod transaction;
pub mod type_map;

use std::path::Path;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::error::{IngestionError, IngestionResult};
use crate::ingestion::{open_source, ReadMode, ReaderOptions, SourceFormat};
use crate::store::Store;
use crate::types::{ColumnSpec, ResolvedColumn};

pub use batch::{BatchLoader, BatchStats, DEFAULT_BATCH_SIZE};
pub use schema::{sanitize_table_name, SchemaBuilder, TableDefinition};
pub use transaction::{LoadState, TransactionCoordinator};
pub use type_map::map_logical_type;

/// What to load: a target name plus resolved columns in persisted order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadJob {
    /// Requested (unsanitized) table name.
    pub target_table: String,
    pub columns: Vec<ResolvedColumn>,
    /// Upload session the source came from, for logs.
    pub source_session: Option<String>,
}

impl LoadJob {
    pub fn new(target_table: impl Into<String>, columns: Vec<ResolvedColumn>) -> Self {
        Self {
            target_table: target_table.into(),
            columns,
            source_session: None,
        }
    }

    /// Build a job from caller column specs, resolving logical types.
    pub fn from_specs(target_table: impl Into<String>, specs: &[ColumnSpec]) -> Self {
        Self::new(target_table, SchemaBuilder::resolve_columns(specs))
    }

    pub fn with_session(mut self, token: impl Into<String>) -> Self {
        self.source_session = Some(token.into());
        self
    }
}

/// Tunables for a load.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Rows per insert statement.
    pub batch_size: usize,
    pub reader: ReaderOptions,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            reader: ReaderOptions::default(),
        }
    }
}

/// Outcome of a committed load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// Sanitized table name that was created.
    pub table: String,
    pub rows_inserted: u64,
    pub batches: usize,
    /// Whether an auto-increment `id` column was added.
    pub surrogate_key: bool,
    #[serde(serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// Load `path` into a new table described by `job`.
///
/// The table either ends up created and fully populated, or not created at all.
pub fn load_table(
    store: &mut dyn Store,
    path: impl AsRef<Path>,
    format: SourceFormat,
    job: &LoadJob,
    options: &LoadOptions,
) -> IngestionResult<LoadReport> {
    let path = path.as_ref();
    let started = Instant::now();
    let def = SchemaBuilder.build(&job.target_table, job.columns.clone())?;

    let span = tracing::info_span!(
        "load",
        table = %def.name,
        session = job.source_session.as_deref().unwrap_or(""),
        %format
    );
    let _guard = span.enter();

    let mut reader = options.reader.clone();
    reader.format = Some(format);

    let mut coordinator = TransactionCoordinator::new(store, options.batch_size);
    let stats = coordinator.execute(&def, || open_source(path, ReadMode::Full, &reader))?;

    Ok(LoadReport {
        table: def.name,
        rows_inserted: stats.rows_inserted,
        batches: stats.batches,
        surrogate_key: def.surrogate_key,
        elapsed: started.elapsed(),
    })
}

/// Check that every selected column is one of `headers`, without touching storage.
pub fn validate_selection(headers: &[String], columns: &[ResolvedColumn]) -> IngestionResult<()> {
    match columns.iter().find(|c| !headers.contains(&c.name)) {
        Some(missing) => Err(IngestionError::validation(format!(
            "column '{}' is not in the uploaded headers",
            missing.name
        ))),
        None => Ok(()),
    }
}
