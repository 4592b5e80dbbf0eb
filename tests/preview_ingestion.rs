mod common;

use std::path::Path;
use std::sync::Arc;

use common::fixture;
use tabular_ingest::ingestion::{
    preview_path, BridgeConnection, BridgeRegistry, PreviewSampler, ReaderOptions, TableBridge,
    TableEntry, TableKind, TabularSource,
};
use tabular_ingest::store::DuckDbStore;
use tabular_ingest::types::Value;
use tabular_ingest::IngestionError;

#[test]
fn preview_keeps_header_order_and_rows() {
    let preview = preview_path(fixture("people.csv")).unwrap();
    assert_eq!(preview.headers, vec!["name", "age", "city"]);
    assert_eq!(preview.row_count(), 3);
    assert_eq!(
        preview.rows[1],
        vec![Value::from("Grace"), Value::from("45"), Value::from("New York")]
    );
}

#[test]
fn preview_is_capped_at_ten_rows() {
    let preview = preview_path(fixture("many_rows.csv")).unwrap();
    assert_eq!(preview.row_count(), 10);
    assert_eq!(preview.rows[0][0], Value::from("1"));
    assert_eq!(preview.rows[9][0], Value::from("10"));
}

#[test]
fn tab_delimited_cells_keep_commas() {
    let preview = preview_path(fixture("notes.tsv")).unwrap();
    assert_eq!(preview.headers, vec!["id", "name", "note"]);
    assert_eq!(preview.rows[0][2], Value::from("uses, commas"));
    assert_eq!(preview.rows[1][2], Value::from(""));
}

#[test]
fn markdown_table_preview() {
    let preview = preview_path(fixture("scores.md")).unwrap();
    assert_eq!(preview.headers, vec!["name", "score"]);
    assert_eq!(preview.row_count(), 2);
    assert_eq!(preview.rows[1], vec![Value::from("bob"), Value::from("7")]);
}

#[test]
fn short_rows_pad_with_empty_strings() {
    let preview = preview_path(fixture("short_row.csv")).unwrap();
    assert_eq!(
        preview.rows[1],
        vec![Value::from("1"), Value::from("2"), Value::from("")]
    );
}

#[test]
fn header_only_file_is_empty_source() {
    let err = preview_path(fixture("header_only.csv")).unwrap_err();
    assert!(matches!(err, IngestionError::EmptySource { .. }));
}

#[test]
fn missing_file_is_unreadable() {
    let err = preview_path(fixture("does_not_exist.csv")).unwrap_err();
    assert!(matches!(err, IngestionError::UnreadableFile { .. }));
}

#[test]
fn duplicate_headers_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dup.csv");
    std::fs::write(&path, "a,b,a\n1,2,3\n").unwrap();
    let err = preview_path(&path).unwrap_err();
    assert!(matches!(err, IngestionError::Validation { .. }));
}

fn write_duckdb(path: &Path, sql: &str) {
    let store = DuckDbStore::open(path).unwrap();
    store.execute_batch(sql).unwrap();
}

#[test]
fn duckdb_file_previews_first_base_table() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("source.duckdb");
    write_duckdb(
        &path,
        "CREATE TABLE zeta (x INTEGER);
         CREATE TABLE alpha (id INTEGER, name VARCHAR, tags VARCHAR[], score DOUBLE);
         INSERT INTO alpha SELECT i, 'n' || i, ['a', 'b'], i / 2 FROM range(1, 31) t(i);
         CREATE VIEW aaa_view AS SELECT * FROM alpha;",
    );

    let preview = preview_path(&path).unwrap();
    assert_eq!(preview.headers, vec!["id", "name", "tags", "score"]);
    assert_eq!(preview.row_count(), 10);
    assert_eq!(preview.rows[0][0], Value::Int64(1));
    assert_eq!(preview.rows[0][1], Value::from("n1"));
    assert_eq!(preview.rows[0][2], Value::Json(serde_json::json!(["a", "b"])));
    assert_eq!(preview.rows[0][3], Value::Float64(0.5));
}

#[test]
fn duckdb_file_without_tables_is_no_table_found() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.duckdb");
    write_duckdb(&path, "CREATE VIEW only_view AS SELECT 1 AS x;");

    let err = preview_path(&path).unwrap_err();
    assert!(matches!(err, IngestionError::NoTableFound { .. }));
}

#[test]
fn access_file_needs_a_bridge() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("legacy.accdb");
    std::fs::write(&path, b"not really access").unwrap();

    let err = preview_path(&path).unwrap_err();
    match err {
        IngestionError::UnreadableFile { message, .. } => assert!(message.contains("accdb")),
        other => panic!("unexpected error: {other}"),
    }
}

struct FakeAccess;

struct FakeConnection;

impl TableBridge for FakeAccess {
    fn name(&self) -> &str {
        "fake access"
    }

    fn connect(&self, _path: &Path) -> Result<Box<dyn BridgeConnection>, String> {
        Ok(Box::new(FakeConnection))
    }
}

impl BridgeConnection for FakeConnection {
    fn tables(&mut self) -> Result<Vec<TableEntry>, String> {
        Ok(vec![
            TableEntry {
                schema: None,
                name: "MSysObjects".into(),
                kind: TableKind::System,
            },
            TableEntry {
                schema: None,
                name: "qryCustomers".into(),
                kind: TableKind::View,
            },
            TableEntry::table(None, "Customers"),
        ])
    }

    fn select_all(
        self: Box<Self>,
        table: &TableEntry,
        limit: Option<usize>,
    ) -> Result<TabularSource, String> {
        assert_eq!(table.name, "Customers");
        let rows = (1..=50)
            .map(|i| Ok::<_, IngestionError>(vec![Value::Int64(i), Value::from(format!("c{i}"))]));
        Ok(TabularSource {
            headers: vec!["ID".into(), "Name".into()],
            rows: Box::new(rows.take(limit.unwrap_or(usize::MAX))),
        })
    }
}

#[test]
fn registered_bridge_reads_first_user_table() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("legacy.accdb");
    std::fs::write(&path, b"opaque").unwrap();

    let mut bridges = BridgeRegistry::default();
    bridges.register("accdb", Arc::new(FakeAccess));
    let sampler = PreviewSampler::new(ReaderOptions {
        format: None,
        bridges,
    });

    let preview = sampler.sample(&path).unwrap();
    assert_eq!(preview.headers, vec!["ID", "Name"]);
    assert_eq!(preview.row_count(), 10);
    assert_eq!(preview.rows[9], vec![Value::Int64(10), Value::from("c10")]);
}
