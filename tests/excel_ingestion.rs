#![cfg(feature = "excel_test_writer")]

use std::path::Path;

use tabular_ingest::ingestion::{preview_path, SourceFormat};
use tabular_ingest::load::{load_table, LoadJob, LoadOptions};
use tabular_ingest::store::DuckDbStore;
use tabular_ingest::types::{ColumnSpec, Value};

fn write_people_xlsx(path: &Path) {
    use rust_xlsxwriter::Workbook;

    let mut wb = Workbook::new();
    let ws = wb.add_worksheet();
    ws.set_name("People").unwrap();

    // header
    ws.write_string(0, 0, "id").unwrap();
    ws.write_string(0, 1, "name").unwrap();
    ws.write_string(0, 2, "score").unwrap();
    ws.write_string(0, 3, "active").unwrap();

    // row 1
    ws.write_number(1, 0, 1).unwrap();
    ws.write_string(1, 1, "Ada").unwrap();
    ws.write_number(1, 2, 98.5).unwrap();
    ws.write_boolean(1, 3, true).unwrap();

    // row 2, no score
    ws.write_number(2, 0, 2).unwrap();
    ws.write_string(2, 1, "Grace").unwrap();
    ws.write_boolean(2, 3, false).unwrap();

    // second sheet is ignored
    let other = wb.add_worksheet();
    other.set_name("Other").unwrap();
    other.write_string(0, 0, "unrelated").unwrap();
    other.write_number(1, 0, 42).unwrap();

    wb.save(path).unwrap();
}

#[test]
fn first_sheet_preview_keeps_cell_types() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("people.xlsx");
    write_people_xlsx(&path);

    let preview = preview_path(&path).unwrap();
    assert_eq!(preview.headers, vec!["id", "name", "score", "active"]);
    assert_eq!(preview.row_count(), 2);
    assert_eq!(
        preview.rows[0],
        vec![
            Value::Int64(1),
            Value::from("Ada"),
            Value::Float64(98.5),
            Value::Bool(true),
        ]
    );
    // absent cell
    assert_eq!(preview.rows[1][2], Value::from(""));
}

#[test]
fn workbook_loads_with_caller_id() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("people.xlsx");
    write_people_xlsx(&path);

    let mut store = DuckDbStore::memory().unwrap();
    let specs = vec![
        ColumnSpec::new("id").with_type("INT"),
        ColumnSpec::new("name"),
        ColumnSpec::new("score").with_type("FLOAT"),
    ];
    let report = load_table(
        &mut store,
        &path,
        SourceFormat::Spreadsheet,
        &LoadJob::from_specs("people", &specs),
        &LoadOptions::default(),
    )
    .unwrap();
    assert!(!report.surrogate_key);
    assert_eq!(report.rows_inserted, 2);

    let rows = store
        .query_rows("SELECT id, name, score FROM people ORDER BY id")
        .unwrap();
    assert_eq!(
        rows[0],
        vec![Value::Int64(1), Value::from("Ada"), Value::Float64(98.5)]
    );
    // empty string into a non-text column binds NULL
    assert_eq!(rows[1][2], Value::Null);
}
