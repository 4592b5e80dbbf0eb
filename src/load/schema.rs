//! Target table naming, collision checks, and DDL.

use std::collections::HashSet;

use crate::error::{IngestionError, IngestionResult};
use crate::store::duckdb::quote_ident;
use crate::store::{StoreError, StoreTransaction};
use crate::types::{ColumnSpec, ResolvedColumn};

use super::type_map::map_logical_type;

/// Name of the surrogate key column.
pub const SURROGATE_KEY: &str = "id";

/// Keep only `[A-Za-z0-9_]` and lowercase the rest.
///
/// Fails with [`IngestionError::InvalidName`] when nothing is left.
pub fn sanitize_table_name(requested: &str) -> IngestionResult<String> {
    let name: String = requested
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .map(|c| c.to_ascii_lowercase())
        .collect();
    if name.is_empty() {
        return Err(IngestionError::InvalidName {
            requested: requested.to_owned(),
        });
    }
    Ok(name)
}

/// A validated table layout, ready to be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDefinition {
    /// Sanitized table name.
    pub name: String,
    /// Source-backed columns in caller order. Excludes the surrogate key.
    pub columns: Vec<ResolvedColumn>,
    /// Whether an auto-increment `id` primary key is prepended.
    pub surrogate_key: bool,
}

impl TableDefinition {
    pub fn sequence_name(&self) -> String {
        format!("{}_id_seq", self.name)
    }

    /// Statements that create the table, in execution order.
    pub fn ddl(&self) -> Vec<String> {
        let mut defs = Vec::with_capacity(self.columns.len() + 1);
        let mut statements = Vec::with_capacity(2);
        if self.surrogate_key {
            let seq = self.sequence_name();
            statements.push(format!("CREATE SEQUENCE IF NOT EXISTS {}", quote_ident(&seq)));
            defs.push(format!(
                "{} BIGINT PRIMARY KEY DEFAULT nextval('{seq}')",
                quote_ident(SURROGATE_KEY)
            ));
        }
        defs.extend(
            self.columns
                .iter()
                .map(|c| format!("{} {}", quote_ident(&c.name), c.backend_type.sql())),
        );
        statements.push(format!(
            "CREATE TABLE {} ({})",
            quote_ident(&self.name),
            defs.join(", ")
        ));
        statements
    }
}

/// Builds and creates [`TableDefinition`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaBuilder;

impl SchemaBuilder {
    /// Resolve the selected specs, in order, through the type mapper.
    pub fn resolve_columns(specs: &[ColumnSpec]) -> Vec<ResolvedColumn> {
        specs
            .iter()
            .filter(|s| s.selected)
            .map(|s| ResolvedColumn::new(&s.name, map_logical_type(s.logical_type.as_deref())))
            .collect()
    }

    /// Sanitize the name and lay out the columns. Pure; touches no store.
    pub fn build(
        &self,
        requested_name: &str,
        columns: Vec<ResolvedColumn>,
    ) -> IngestionResult<TableDefinition> {
        let name = sanitize_table_name(requested_name)?;
        if columns.is_empty() {
            return Err(IngestionError::validation("no columns selected"));
        }
        let mut seen = HashSet::with_capacity(columns.len());
        for c in &columns {
            if !seen.insert(c.name.as_str()) {
                return Err(IngestionError::validation(format!(
                    "column '{}' selected more than once",
                    c.name
                )));
            }
        }
        let surrogate_key = !columns
            .iter()
            .any(|c| c.name.eq_ignore_ascii_case(SURROGATE_KEY));

        Ok(TableDefinition {
            name,
            columns,
            surrogate_key,
        })
    }

    /// Fail with [`IngestionError::Conflict`] if the table already exists.
    pub fn check_conflict(
        &self,
        tx: &mut dyn StoreTransaction,
        def: &TableDefinition,
    ) -> IngestionResult<()> {
        let exists = tx
            .table_exists(&def.name)
            .map_err(|e| IngestionError::load_failed(&def.name, e))?;
        if exists {
            return Err(IngestionError::Conflict {
                table: def.name.clone(),
            });
        }
        Ok(())
    }

    /// Run the DDL inside `tx`. A create that races another loader reports [`IngestionError::Conflict`].
    pub fn create(&self, tx: &mut dyn StoreTransaction, def: &TableDefinition) -> IngestionResult<()> {
        for sql in def.ddl() {
            tx.execute(&sql, &[]).map_err(|e| match e {
                StoreError::AlreadyExists(_) => IngestionError::Conflict {
                    table: def.name.clone(),
                },
                other => IngestionError::load_failed(&def.name, other),
            })?;
        }
        tracing::info!(
            table = %def.name,
            columns = def.columns.len(),
            surrogate_key = def.surrogate_key,
            "created table"
        );
        Ok(())
    }
}
