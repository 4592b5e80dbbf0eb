#![cfg(feature = "excel")]

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};

use crate::error::{IngestionError, IngestionResult};
use crate::types::Value;

use super::unified::{align_row, FormatReader, ReadMode, SourceFormat, TabularSource};

/// Reads the first sheet of a workbook (`.xlsx`, `.xls`, `.ods`, etc.).
///
/// Behavior:
/// - Uses the first sheet in declaration order; other sheets are ignored
/// - Detects the first non-empty row as the header row
/// - Skips fully empty data rows
/// - Absent cells become empty strings in both read modes
///
/// The whole sheet is loaded into memory by `calamine`; only the row conversion is lazy.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpreadsheetReader;

impl FormatReader for SpreadsheetReader {
    fn format(&self) -> SourceFormat {
        SourceFormat::Spreadsheet
    }

    fn open(&self, path: &Path, mode: ReadMode) -> IngestionResult<TabularSource> {
        let mut workbook =
            open_workbook_auto(path).map_err(|e| IngestionError::unreadable(path, e))?;

        let first_sheet = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| IngestionError::EmptySource {
                path: path.to_path_buf(),
            })?;
        let range = workbook
            .worksheet_range(&first_sheet)
            .map_err(|e| IngestionError::unreadable(path, e))?;

        let mut rows = range
            .rows()
            .filter(|row| row.iter().any(|c| !matches!(c, Data::Empty)));

        let headers: Vec<String> = match rows.next() {
            Some(header_row) => header_row.iter().map(cell_to_header_string).collect(),
            None => {
                return Err(IngestionError::EmptySource {
                    path: path.to_path_buf(),
                });
            }
        };

        let width = headers.len();
        let limit = mode.row_limit().unwrap_or(usize::MAX);
        let data: Vec<Vec<Value>> = rows
            .take(limit)
            .map(|row| {
                let cells = row.iter().map(convert_cell).collect();
                // Spreadsheet rows default absent cells to "" regardless of mode.
                align_row(cells, width, ReadMode::Preview)
            })
            .collect();

        tracing::debug!(
            path = %path.display(),
            sheet = %first_sheet,
            columns = width,
            rows = data.len(),
            "read spreadsheet"
        );

        Ok(TabularSource {
            headers,
            rows: Box::new(data.into_iter().map(Ok)),
        })
    }
}

fn cell_to_header_string(c: &Data) -> String {
    match c {
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => format_float(*f),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(f) => f.to_string(),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
        Data::Error(e) => format!("{e:?}"),
        Data::Empty => "".to_string(),
    }
}

fn convert_cell(c: &Data) -> Value {
    match c {
        Data::Empty => Value::Utf8(String::new()),
        Data::String(s) => Value::Utf8(s.clone()),
        Data::Int(i) => Value::Int64(*i),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                Value::Int64(*f as i64)
            } else {
                Value::Float64(*f)
            }
        }
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::Utf8(s.clone()),
        Data::DateTime(_) => Value::Utf8(c.to_string()),
        Data::Error(e) => Value::Utf8(format!("{e:?}")),
    }
}

fn format_float(f: f64) -> String {
    if f.fract() == 0.0 {
        (f as i64).to_string()
    } else {
        f.to_string()
    }
}
