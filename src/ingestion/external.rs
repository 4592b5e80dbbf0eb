//! External table reader: desktop-database files accessed through a native bridge.
//!
//! A [`TableBridge`] knows how to open one kind of database file. The reader enumerates the
//! file's tables, keeps only user tables (no views, no system objects), picks the first one, and
//! selects every column from it, pushing the preview row cap down into the query.
//!
//! [`DuckDbBridge`] is bundled for `.duckdb` / `.ddb` files. Access files (`.mdb`, `.accdb`) need a
//! driver-backed bridge registered by the caller through [`BridgeRegistry::register`].

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{IngestionError, IngestionResult};
use crate::store::duckdb::{quote_ident, read_only_connection};
use crate::types::Value;

use super::unified::{align_row, FormatReader, ReadMode, SourceFormat, TabularSource};

/// Classification of a catalog object reported by a bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    /// A user table holding rows.
    Table,
    View,
    /// Catalog or engine-internal object.
    System,
}

/// One catalog entry, in the order the bridge reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableEntry {
    pub schema: Option<String>,
    pub name: String,
    pub kind: TableKind,
}

impl TableEntry {
    pub fn table(schema: Option<&str>, name: &str) -> Self {
        Self {
            schema: schema.map(str::to_owned),
            name: name.to_owned(),
            kind: TableKind::Table,
        }
    }
}

/// An open connection to an external database file.
pub trait BridgeConnection {
    /// Enumerate catalog objects.
    fn tables(&mut self) -> Result<Vec<TableEntry>, String>;

    /// Select all columns of `table`, at most `limit` rows when set.
    ///
    /// The connection moves into the returned source so rows can stream.
    fn select_all(
        self: Box<Self>,
        table: &TableEntry,
        limit: Option<usize>,
    ) -> Result<TabularSource, String>;
}

/// Opens external database files of one kind.
pub trait TableBridge: Send + Sync {
    /// Human-readable driver name used in error messages.
    fn name(&self) -> &str;

    fn connect(&self, path: &Path) -> Result<Box<dyn BridgeConnection>, String>;
}

/// Bridges keyed by lower-cased file extension.
#[derive(Clone)]
pub struct BridgeRegistry {
    bridges: HashMap<String, Arc<dyn TableBridge>>,
}

impl BridgeRegistry {
    /// A registry with no bridges at all.
    pub fn empty() -> Self {
        Self {
            bridges: HashMap::new(),
        }
    }

    /// Register `bridge` for `extension` (without the dot), replacing any previous one.
    pub fn register(&mut self, extension: &str, bridge: Arc<dyn TableBridge>) {
        self.bridges.insert(extension.to_ascii_lowercase(), bridge);
    }

    pub fn get(&self, extension: &str) -> Option<Arc<dyn TableBridge>> {
        self.bridges.get(&extension.to_ascii_lowercase()).cloned()
    }
}

impl Default for BridgeRegistry {
    /// DuckDB files are readable out of the box.
    fn default() -> Self {
        let mut registry = Self::empty();
        let duckdb: Arc<dyn TableBridge> = Arc::new(DuckDbBridge);
        registry.register("duckdb", Arc::clone(&duckdb));
        registry.register("ddb", duckdb);
        registry
    }
}

impl fmt::Debug for BridgeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut extensions: Vec<&String> = self.bridges.keys().collect();
        extensions.sort();
        f.debug_struct("BridgeRegistry")
            .field("extensions", &extensions)
            .finish()
    }
}

/// [`FormatReader`] for external table files.
#[derive(Debug, Clone, Default)]
pub struct ExternalTableReader {
    bridges: BridgeRegistry,
}

impl ExternalTableReader {
    pub fn new(bridges: BridgeRegistry) -> Self {
        Self { bridges }
    }
}

impl FormatReader for ExternalTableReader {
    fn format(&self) -> SourceFormat {
        SourceFormat::ExternalTable
    }

    fn open(&self, path: &Path, mode: ReadMode) -> IngestionResult<TabularSource> {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let bridge = self.bridges.get(&ext).ok_or_else(|| {
            IngestionError::unreadable(
                path,
                format!("no native bridge registered for '.{ext}' files; install a database driver bridge for this format"),
            )
        })?;

        let mut conn = bridge
            .connect(path)
            .map_err(|e| IngestionError::unreadable(path, format!("{}: {e}", bridge.name())))?;
        let entries = conn
            .tables()
            .map_err(|e| IngestionError::unreadable(path, format!("{}: {e}", bridge.name())))?;

        let table = entries
            .into_iter()
            .find(|t| t.kind == TableKind::Table)
            .ok_or_else(|| IngestionError::NoTableFound {
                path: path.to_path_buf(),
            })?;
        tracing::info!(path = %path.display(), table = %table.name, bridge = bridge.name(), "found external table");

        let source = conn
            .select_all(&table, mode.row_limit())
            .map_err(|e| IngestionError::unreadable(path, format!("{}: {e}", bridge.name())))?;

        let width = source.headers.len();
        Ok(TabularSource {
            headers: source.headers,
            rows: Box::new(source.rows.map(move |row| row.map(|r| align_row(r, width, mode)))),
        })
    }
}

/// Bridge for DuckDB database files, opened read-only.
#[derive(Debug, Clone, Copy, Default)]
pub struct DuckDbBridge;

impl TableBridge for DuckDbBridge {
    fn name(&self) -> &str {
        "DuckDB"
    }

    fn connect(&self, path: &Path) -> Result<Box<dyn BridgeConnection>, String> {
        let conn = read_only_connection(path).map_err(|e| e.to_string())?;
        Ok(Box::new(DuckDbBridgeConnection {
            conn,
            path: path.to_path_buf(),
        }))
    }
}

/// Rows fetched per query when streaming a DuckDB table.
const DUCKDB_PAGE_SIZE: usize = 2_000;

struct DuckDbBridgeConnection {
    conn: duckdb::Connection,
    path: PathBuf,
}

impl BridgeConnection for DuckDbBridgeConnection {
    fn tables(&mut self) -> Result<Vec<TableEntry>, String> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT table_schema, table_name, table_type
                 FROM information_schema.tables
                 ORDER BY table_catalog, table_schema, table_name",
            )
            .map_err(|e| e.to_string())?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(|e| e.to_string())?;

        let mut entries = Vec::new();
        for row in rows {
            let (schema, name, table_type) = row.map_err(|e| e.to_string())?;
            let kind = if matches!(schema.as_str(), "information_schema" | "pg_catalog") {
                TableKind::System
            } else if table_type.eq_ignore_ascii_case("BASE TABLE") {
                TableKind::Table
            } else {
                TableKind::View
            };
            entries.push(TableEntry {
                schema: Some(schema),
                name,
                kind,
            });
        }
        Ok(entries)
    }

    fn select_all(
        self: Box<Self>,
        table: &TableEntry,
        limit: Option<usize>,
    ) -> Result<TabularSource, String> {
        let columns = self.columns(table)?;
        let headers = columns.iter().map(|(name, _)| name.clone()).collect();

        let select_list = columns
            .iter()
            .map(|(name, kind)| kind.select_expr(&quote_ident(name)))
            .collect::<Vec<_>>()
            .join(", ");
        let qualified = match &table.schema {
            Some(schema) => format!("{}.{}", quote_ident(schema), quote_ident(&table.name)),
            None => quote_ident(&table.name),
        };

        let pages = DuckDbPages {
            conn: self.conn,
            path: self.path,
            sql: format!("SELECT {select_list} FROM {qualified}"),
            kinds: columns.into_iter().map(|(_, kind)| kind).collect(),
            offset: 0,
            remaining: limit,
            buffer: Vec::new().into_iter(),
            done: false,
        };

        Ok(TabularSource {
            headers,
            rows: Box::new(pages),
        })
    }
}

impl DuckDbBridgeConnection {
    fn columns(&self, table: &TableEntry) -> Result<Vec<(String, ColumnRead)>, String> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT column_name, data_type
                 FROM information_schema.columns
                 WHERE table_name = ? AND table_schema = coalesce(?, current_schema())
                 ORDER BY ordinal_position",
            )
            .map_err(|e| e.to_string())?;
        let rows = stmt
            .query_map(duckdb::params![table.name, table.schema], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e| e.to_string())?;

        let mut columns = Vec::new();
        for row in rows {
            let (name, data_type) = row.map_err(|e| e.to_string())?;
            columns.push((name, ColumnRead::for_type(&data_type)));
        }
        Ok(columns)
    }
}

/// How a DuckDB column is projected and decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnRead {
    Bool,
    Int,
    Float,
    Json,
    Text,
}

impl ColumnRead {
    fn for_type(data_type: &str) -> Self {
        let t = data_type.trim().to_ascii_uppercase();
        if t.ends_with(']')
            || t.starts_with("STRUCT")
            || t.starts_with("MAP")
            || t.starts_with("UNION")
        {
            ColumnRead::Json
        } else if t == "BOOLEAN" {
            ColumnRead::Bool
        } else if matches!(
            t.as_str(),
            "TINYINT" | "SMALLINT" | "INTEGER" | "BIGINT" | "UTINYINT" | "USMALLINT" | "UINTEGER"
        ) {
            ColumnRead::Int
        } else if matches!(t.as_str(), "FLOAT" | "DOUBLE") {
            ColumnRead::Float
        } else {
            ColumnRead::Text
        }
    }

    fn select_expr(&self, quoted: &str) -> String {
        match self {
            ColumnRead::Bool => quoted.to_owned(),
            ColumnRead::Int => format!("CAST({quoted} AS BIGINT)"),
            ColumnRead::Float => format!("CAST({quoted} AS DOUBLE)"),
            ColumnRead::Json => format!("CAST(to_json({quoted}) AS VARCHAR)"),
            ColumnRead::Text => format!("CAST({quoted} AS VARCHAR)"),
        }
    }

    fn decode(&self, row: &duckdb::Row<'_>, idx: usize) -> duckdb::Result<Value> {
        let value = match self {
            ColumnRead::Bool => row.get::<_, Option<bool>>(idx)?.map(Value::Bool),
            ColumnRead::Int => row.get::<_, Option<i64>>(idx)?.map(Value::Int64),
            ColumnRead::Float => row.get::<_, Option<f64>>(idx)?.map(Value::Float64),
            ColumnRead::Json => row.get::<_, Option<String>>(idx)?.map(|s| {
                serde_json::from_str(&s)
                    .map(Value::Json)
                    .unwrap_or(Value::Utf8(s))
            }),
            ColumnRead::Text => row.get::<_, Option<String>>(idx)?.map(Value::Utf8),
        };
        Ok(value.unwrap_or(Value::Null))
    }
}

/// Streams a table in fixed-size pages so only one page is held in memory.
struct DuckDbPages {
    conn: duckdb::Connection,
    path: PathBuf,
    sql: String,
    kinds: Vec<ColumnRead>,
    offset: usize,
    remaining: Option<usize>,
    buffer: std::vec::IntoIter<Vec<Value>>,
    done: bool,
}

impl DuckDbPages {
    fn fetch_page(&mut self) -> duckdb::Result<Vec<Vec<Value>>> {
        let page = match self.remaining {
            Some(remaining) => remaining.min(DUCKDB_PAGE_SIZE),
            None => DUCKDB_PAGE_SIZE,
        };
        let sql = format!("{} LIMIT {} OFFSET {}", self.sql, page, self.offset);
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([])?;

        let mut out = Vec::with_capacity(page);
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(self.kinds.len());
            for (idx, kind) in self.kinds.iter().enumerate() {
                values.push(kind.decode(row, idx)?);
            }
            out.push(values);
        }

        self.offset += out.len();
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining -= out.len();
        }
        if out.len() < page || self.remaining == Some(0) {
            self.done = true;
        }
        Ok(out)
    }
}

impl Iterator for DuckDbPages {
    type Item = IngestionResult<Vec<Value>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(row) = self.buffer.next() {
                return Some(Ok(row));
            }
            if self.done {
                return None;
            }
            match self.fetch_page() {
                Ok(page) => self.buffer = page.into_iter(),
                Err(e) => {
                    self.done = true;
                    return Some(Err(IngestionError::unreadable(&self.path, e)));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_reads_follow_declared_type() {
        assert_eq!(ColumnRead::for_type("INTEGER"), ColumnRead::Int);
        assert_eq!(ColumnRead::for_type("DOUBLE"), ColumnRead::Float);
        assert_eq!(ColumnRead::for_type("VARCHAR[]"), ColumnRead::Json);
        assert_eq!(ColumnRead::for_type("STRUCT(a INTEGER)"), ColumnRead::Json);
        assert_eq!(ColumnRead::for_type("DECIMAL(18,2)"), ColumnRead::Text);
        assert_eq!(ColumnRead::for_type("DATE"), ColumnRead::Text);
    }

    #[test]
    fn access_files_need_a_registered_bridge() {
        let reader = ExternalTableReader::default();
        let err = reader
            .open(Path::new("legacy.accdb"), ReadMode::Preview)
            .unwrap_err();
        assert!(matches!(err, IngestionError::UnreadableFile { .. }));
        assert!(err.to_string().contains("no native bridge"));
    }
}
