//! One atomic unit around table creation and every batch insert.

use crate::error::{IngestionError, IngestionResult};
use crate::ingestion::TabularSource;
use crate::store::{Store, StoreTransaction};

use super::batch::{project, BatchLoader, BatchStats};
use super::schema::{SchemaBuilder, TableDefinition};

/// Progress of a load through its transaction.
///
/// Everything before [`LoadState::Committed`] is invisible outside the transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Validated,
    TableCreated,
    /// Rows inserted so far.
    Loading(u64),
    Committed,
    RolledBack,
}

/// Runs a load: collision check, DDL, then batched inserts, committed once or rolled back.
pub struct TransactionCoordinator<'s> {
    store: &'s mut dyn Store,
    batch_size: usize,
    states: Vec<LoadState>,
}

impl std::fmt::Debug for TransactionCoordinator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionCoordinator")
            .field("batch_size", &self.batch_size)
            .field("states", &self.states)
            .finish_non_exhaustive()
    }
}

impl<'s> TransactionCoordinator<'s> {
    pub fn new(store: &'s mut dyn Store, batch_size: usize) -> Self {
        Self {
            store,
            batch_size,
            states: Vec::new(),
        }
    }

    /// State transitions so far. Consecutive `Loading` steps are collapsed into the latest one.
    pub fn states(&self) -> &[LoadState] {
        &self.states
    }

    pub fn state(&self) -> Option<LoadState> {
        self.states.last().copied()
    }

    /// Create `def` and fill it from the source returned by `open`.
    ///
    /// `open` runs after the table is created and must return a full (uncapped) source. Any error
    /// rolls the whole transaction back; the table and every inserted row disappear. Errors other
    /// than [`IngestionError::Conflict`] and [`IngestionError::Validation`] surface as
    /// [`IngestionError::LoadFailed`].
    pub fn execute<F>(&mut self, def: &TableDefinition, open: F) -> IngestionResult<BatchStats>
    where
        F: FnOnce() -> IngestionResult<TabularSource>,
    {
        let Self {
            store,
            batch_size,
            states,
        } = self;
        record(states, LoadState::Validated);

        let mut tx = store
            .begin()
            .map_err(|e| IngestionError::load_failed(&def.name, e))?;

        match fill(&mut *tx, def, *batch_size, open, states) {
            Ok(stats) => match tx.commit() {
                Ok(()) => {
                    record(states, LoadState::Committed);
                    tracing::info!(
                        table = %def.name,
                        rows = stats.rows_inserted,
                        batches = stats.batches,
                        "load committed"
                    );
                    Ok(stats)
                }
                Err(e) => {
                    record(states, LoadState::RolledBack);
                    tracing::warn!(table = %def.name, error = %e, "commit failed");
                    Err(IngestionError::load_failed(&def.name, e))
                }
            },
            Err(err) => {
                if let Err(e) = tx.rollback() {
                    tracing::warn!(table = %def.name, error = %e, "rollback reported an error");
                }
                record(states, LoadState::RolledBack);
                tracing::warn!(table = %def.name, error = %err, "load rolled back");
                Err(surface(err, &def.name))
            }
        }
    }
}

fn fill<F>(
    tx: &mut dyn StoreTransaction,
    def: &TableDefinition,
    batch_size: usize,
    open: F,
    states: &mut Vec<LoadState>,
) -> IngestionResult<BatchStats>
where
    F: FnOnce() -> IngestionResult<TabularSource>,
{
    let schema = SchemaBuilder;
    schema.check_conflict(tx, def)?;
    schema.create(tx, def)?;
    record(states, LoadState::TableCreated);

    let source = open()?;
    let projection = project(&source.headers, &def.columns)?;
    BatchLoader::new(def, batch_size).load(tx, source.rows, &projection, |rows| {
        record(states, LoadState::Loading(rows))
    })
}

fn record(states: &mut Vec<LoadState>, next: LoadState) {
    if let (Some(LoadState::Loading(_)), LoadState::Loading(_)) = (states.last(), next) {
        states.pop();
    }
    states.push(next);
}

fn surface(err: IngestionError, table: &str) -> IngestionError {
    match err {
        IngestionError::Conflict { .. }
        | IngestionError::Validation { .. }
        | IngestionError::LoadFailed { .. } => err,
        other => IngestionError::load_failed(table, other),
    }
}
