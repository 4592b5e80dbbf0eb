//! Relational store seam.
//!
//! The load path only needs three things from a store: an existence check, a transaction, and
//! parameterized statement execution inside it. [`duckdb::DuckDbStore`] is the bundled backend.

pub mod duckdb;

use thiserror::Error;

use crate::types::Value;

pub use self::duckdb::DuckDbStore;

/// Errors surfaced by a [`Store`] implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A `CREATE` hit an object that already exists.
    #[error("object already exists: {0}")]
    AlreadyExists(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("transaction error: {0}")]
    Transaction(String),
}

/// A relational store that can check for tables and open transactions.
pub trait Store {
    /// Whether a table or view named `name` exists in the current schema.
    fn table_exists(&mut self, name: &str) -> Result<bool, StoreError>;

    /// Open a transaction. Dropping the returned handle without committing rolls it back.
    fn begin(&mut self) -> Result<Box<dyn StoreTransaction + '_>, StoreError>;
}

/// One open transaction. Nothing it executes is visible to other readers until [`commit`].
///
/// [`commit`]: StoreTransaction::commit
pub trait StoreTransaction {
    fn table_exists(&mut self, name: &str) -> Result<bool, StoreError>;

    /// Execute one statement with positional `?` parameters, returning rows affected.
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64, StoreError>;

    fn commit(self: Box<Self>) -> Result<(), StoreError>;

    fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
