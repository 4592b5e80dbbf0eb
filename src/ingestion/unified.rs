//! Unified reader entrypoint.
//!
//! Most callers should use [`open_source`], which classifies a file by extension (unless a format
//! is forced via [`ReaderOptions::format`]) and returns its header list plus a lazy row iterator.
//!
//! - [`ReadMode::Preview`] caps output at [`PREVIEW_ROW_LIMIT`] data rows and pads short rows with
//!   empty strings.
//! - [`ReadMode::Full`] applies no cap and pads short rows with nulls.
//!
//! Sources are single-pass. Preview and load each call [`open_source`] again.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use crate::error::{IngestionError, IngestionResult};
use crate::types::Value;

use super::delimited::DelimitedTextReader;
use super::external::{BridgeRegistry, ExternalTableReader};

/// Number of data rows a preview carries at most.
pub const PREVIEW_ROW_LIMIT: usize = 10;

/// Supported source kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    /// Comma, tab, or pipe separated text. The default for unknown extensions.
    DelimitedText,
    /// Spreadsheet/workbook formats (feature-gated behind `excel`).
    Spreadsheet,
    /// A desktop-database file read through a [`super::external::TableBridge`].
    ExternalTable,
}

impl SourceFormat {
    /// Classify a file extension (case-insensitive, without the leading dot).
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_ascii_lowercase().as_str() {
            "xlsx" | "xls" | "xlsm" | "xlsb" | "ods" => Self::Spreadsheet,
            "accdb" | "mdb" | "duckdb" | "ddb" => Self::ExternalTable,
            _ => Self::DelimitedText,
        }
    }

    /// Classify a path by its extension. Paths without one are delimited text.
    pub fn classify(path: &Path) -> Self {
        path.extension()
            .and_then(|s| s.to_str())
            .map(Self::from_extension)
            .unwrap_or(Self::DelimitedText)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DelimitedText => "delimited_text",
            Self::Spreadsheet => "spreadsheet",
            Self::ExternalTable => "external_table",
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a read is a bounded preview or a full load pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    Preview,
    Full,
}

impl ReadMode {
    /// Row cap for this mode.
    pub fn row_limit(&self) -> Option<usize> {
        match self {
            ReadMode::Preview => Some(PREVIEW_ROW_LIMIT),
            ReadMode::Full => None,
        }
    }

    /// Value used for cells a short row does not provide.
    pub fn missing_cell(&self) -> Value {
        match self {
            ReadMode::Preview => Value::Utf8(String::new()),
            ReadMode::Full => Value::Null,
        }
    }
}

/// Lazy iterator over rows aligned with [`TabularSource::headers`].
pub type RowIter = Box<dyn Iterator<Item = IngestionResult<Vec<Value>>>>;

/// An opened source: ordered headers plus a single-pass row iterator.
pub struct TabularSource {
    pub headers: Vec<String>,
    pub rows: RowIter,
}

impl fmt::Debug for TabularSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TabularSource")
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// A polymorphic tabular extractor. One implementation per [`SourceFormat`].
pub trait FormatReader {
    fn format(&self) -> SourceFormat;

    /// Open `path` and return its headers and rows.
    fn open(&self, path: &Path, mode: ReadMode) -> IngestionResult<TabularSource>;
}

/// Options controlling unified reading.
#[derive(Clone, Default)]
pub struct ReaderOptions {
    /// If `None`, classify from the file extension.
    pub format: Option<SourceFormat>,
    /// Native bridges for external table files, keyed by extension.
    pub bridges: BridgeRegistry,
}

impl fmt::Debug for ReaderOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReaderOptions")
            .field("format", &self.format)
            .field("bridges", &self.bridges)
            .finish()
    }
}

/// Select the reader for `format`.
pub fn reader_for(format: SourceFormat, options: &ReaderOptions) -> Box<dyn FormatReader> {
    match format {
        SourceFormat::DelimitedText => Box::new(DelimitedTextReader),
        SourceFormat::Spreadsheet => spreadsheet_reader(),
        SourceFormat::ExternalTable => Box::new(ExternalTableReader::new(options.bridges.clone())),
    }
}

/// Open a source in the given mode.
///
/// Header names are normalised: blank headers become `column_<n>` (1-based position) and
/// duplicate names are rejected with [`IngestionError::Validation`].
pub fn open_source(
    path: impl AsRef<Path>,
    mode: ReadMode,
    options: &ReaderOptions,
) -> IngestionResult<TabularSource> {
    let path = path.as_ref();
    let format = options.format.unwrap_or_else(|| SourceFormat::classify(path));
    let reader = reader_for(format, options);

    tracing::debug!(path = %path.display(), %format, ?mode, "opening source");
    let mut source = reader.open(path, mode)?;
    source.headers = normalize_headers(std::mem::take(&mut source.headers))?;
    Ok(source)
}

pub(crate) fn normalize_headers(headers: Vec<String>) -> IngestionResult<Vec<String>> {
    let mut seen = HashSet::with_capacity(headers.len());
    let mut out = Vec::with_capacity(headers.len());
    for (idx, raw) in headers.into_iter().enumerate() {
        let name = match raw.trim() {
            "" => format!("column_{}", idx + 1),
            trimmed => trimmed.to_owned(),
        };
        if !seen.insert(name.clone()) {
            return Err(IngestionError::validation(format!(
                "duplicate column header '{name}'"
            )));
        }
        out.push(name);
    }
    Ok(out)
}

/// Align a parsed row with the header list: excess cells are dropped, missing cells padded.
pub(crate) fn align_row(mut cells: Vec<Value>, width: usize, mode: ReadMode) -> Vec<Value> {
    cells.truncate(width);
    while cells.len() < width {
        cells.push(mode.missing_cell());
    }
    cells
}

#[cfg(feature = "excel")]
fn spreadsheet_reader() -> Box<dyn FormatReader> {
    Box::new(super::excel::SpreadsheetReader)
}

#[cfg(not(feature = "excel"))]
fn spreadsheet_reader() -> Box<dyn FormatReader> {
    Box::new(DisabledSpreadsheetReader)
}

#[cfg(not(feature = "excel"))]
struct DisabledSpreadsheetReader;

#[cfg(not(feature = "excel"))]
impl FormatReader for DisabledSpreadsheetReader {
    fn format(&self) -> SourceFormat {
        SourceFormat::Spreadsheet
    }

    fn open(&self, path: &Path, _mode: ReadMode) -> IngestionResult<TabularSource> {
        Err(IngestionError::unreadable(
            path,
            "spreadsheet reading not enabled (enable cargo feature 'excel')",
        ))
    }
}
