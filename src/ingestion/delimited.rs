//! Delimited text reader (CSV, TSV, pipe-separated and markdown-style tables).
//!
//! Rules:
//!
//! - The delimiter is sniffed once from the first non-blank line: tab, then pipe, else comma.
//! - The first non-blank line is the header row.
//! - Any later line containing `---` is a table separator and is skipped.
//! - Every raw line is one record; quotes never span lines or escape delimiters.
//! - Cells are trimmed, then one surrounding `"` and one surrounding `|` are stripped.
//! - Whitespace-only lines are ignored. A line of bare delimiters is a row of empty cells.

use std::fs::File;
use std::io::{BufRead, BufReader, Cursor, Read};
use std::path::{Path, PathBuf};

use crate::error::{IngestionError, IngestionResult};
use crate::types::Value;

use super::unified::{align_row, FormatReader, ReadMode, SourceFormat, TabularSource};

const SEPARATOR_MARKER: &str = "---";

/// [`FormatReader`] for delimited text files.
#[derive(Debug, Clone, Copy, Default)]
pub struct DelimitedTextReader;

impl FormatReader for DelimitedTextReader {
    fn format(&self) -> SourceFormat {
        SourceFormat::DelimitedText
    }

    fn open(&self, path: &Path, mode: ReadMode) -> IngestionResult<TabularSource> {
        let file = File::open(path).map_err(|e| IngestionError::unreadable(path, e))?;
        read_delimited(path, BufReader::new(file), mode)
    }
}

/// Pick the delimiter for a header line.
pub fn sniff_delimiter(first_line: &str) -> u8 {
    if first_line.contains('\t') {
        b'\t'
    } else if first_line.contains('|') {
        b'|'
    } else {
        b','
    }
}

/// Trim a cell and strip one surrounding quote and one surrounding pipe from each end.
pub fn clean_cell(raw: &str) -> &str {
    let s = raw.trim();
    let s = s.strip_prefix('"').unwrap_or(s);
    let s = s.strip_suffix('"').unwrap_or(s);
    let s = s.strip_prefix('|').unwrap_or(s);
    s.strip_suffix('|').unwrap_or(s)
}

/// Read delimited text from any buffered reader. `path` is only used in error messages.
pub fn read_delimited<R: BufRead + 'static>(
    path: &Path,
    mut input: R,
    mode: ReadMode,
) -> IngestionResult<TabularSource> {
    let first_line = read_first_non_blank_line(path, &mut input)?
        .ok_or_else(|| IngestionError::EmptySource {
            path: path.to_path_buf(),
        })?;

    let delimiter = sniff_delimiter(&first_line);
    let trimmed = first_line.trim();
    // A header like `| a | b |` frames every row with empty border cells.
    let framed = delimiter == b'|' && trimmed.starts_with('|') && trimmed.ends_with('|');

    let replay: Box<dyn Read> = Box::new(Cursor::new(first_line.into_bytes()).chain(input));
    let mut records = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(delimiter)
        .flexible(true)
        .quoting(false)
        .from_reader(replay)
        .into_records();

    let header_record = match records.next() {
        Some(rec) => rec.map_err(|e| IngestionError::unreadable(path, e))?,
        None => {
            return Err(IngestionError::EmptySource {
                path: path.to_path_buf(),
            });
        }
    };
    let headers: Vec<String> = split_cells(&header_record, framed)
        .into_iter()
        .map(str::to_owned)
        .collect();

    tracing::debug!(
        path = %path.display(),
        delimiter = %(delimiter as char).escape_default(),
        columns = headers.len(),
        "parsed delimited header"
    );

    let rows = DelimitedRows {
        path: path.to_path_buf(),
        records,
        width: headers.len(),
        framed,
        mode,
        delimiter,
        remaining_records: mode.row_limit(),
    };

    Ok(TabularSource {
        headers,
        rows: Box::new(rows),
    })
}

fn read_first_non_blank_line<R: BufRead>(
    path: &Path,
    input: &mut R,
) -> IngestionResult<Option<String>> {
    let mut line = String::new();
    loop {
        line.clear();
        let n = input
            .read_line(&mut line)
            .map_err(|e| IngestionError::unreadable(path, e))?;
        if n == 0 {
            return Ok(None);
        }
        if !line.trim().is_empty() {
            return Ok(Some(line));
        }
    }
}

fn split_cells(record: &csv::StringRecord, framed: bool) -> Vec<&str> {
    let mut cells: Vec<&str> = record.iter().collect();
    if framed {
        if cells.last().is_some_and(|c| c.trim().is_empty()) {
            cells.pop();
        }
        if cells.first().is_some_and(|c| c.trim().is_empty()) {
            cells.remove(0);
        }
    }
    cells.into_iter().map(clean_cell).collect()
}

/// Whether the raw line behind `record` held nothing but whitespace.
fn is_blank_line(record: &csv::StringRecord, delimiter: u8) -> bool {
    let only_whitespace = record.iter().all(|field| field.trim().is_empty());
    only_whitespace && (record.len() <= 1 || delimiter.is_ascii_whitespace())
}

struct DelimitedRows {
    path: PathBuf,
    records: csv::StringRecordsIntoIter<Box<dyn Read>>,
    width: usize,
    framed: bool,
    mode: ReadMode,
    delimiter: u8,
    /// Raw records still allowed in preview mode (separators count against it).
    remaining_records: Option<usize>,
}

impl Iterator for DelimitedRows {
    type Item = IngestionResult<Vec<Value>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(remaining) = self.remaining_records.as_mut() {
                if *remaining == 0 {
                    return None;
                }
                *remaining -= 1;
            }

            let record = match self.records.next()? {
                Ok(record) => record,
                Err(e) => {
                    // Stop after the first parse error; the stream position is unreliable.
                    self.remaining_records = Some(0);
                    return Some(Err(IngestionError::unreadable(&self.path, e)));
                }
            };

            if is_blank_line(&record, self.delimiter)
                || record.iter().any(|field| field.contains(SEPARATOR_MARKER))
            {
                continue;
            }

            let cells = split_cells(&record, self.framed)
                .into_iter()
                .map(|cell| self.cell_value(cell))
                .collect();
            return Some(Ok(align_row(cells, self.width, self.mode)));
        }
    }
}

impl DelimitedRows {
    fn cell_value(&self, cell: &str) -> Value {
        if cell.is_empty() && self.mode == ReadMode::Full {
            Value::Null
        } else {
            Value::Utf8(cell.to_owned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(input: &str, mode: ReadMode) -> (Vec<String>, Vec<Vec<Value>>) {
        let src = read_delimited(
            Path::new("inline.txt"),
            Cursor::new(input.to_owned().into_bytes()),
            mode,
        )
        .unwrap();
        let rows = src.rows.collect::<IngestionResult<Vec<_>>>().unwrap();
        (src.headers, rows)
    }

    fn texts(row: &[Value]) -> Vec<String> {
        row.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn tab_wins_over_comma() {
        assert_eq!(sniff_delimiter("a,b\tc"), b'\t');
        let (headers, rows) = read("a,x\tb\n1,2\t3\n", ReadMode::Full);
        assert_eq!(headers, vec!["a,x", "b"]);
        assert_eq!(texts(&rows[0]), vec!["1,2", "3"]);
    }

    #[test]
    fn pipe_wins_over_comma() {
        assert_eq!(sniff_delimiter("a,b|c"), b'|');
        assert_eq!(sniff_delimiter("a,b,c"), b',');
    }

    #[test]
    fn clean_cell_strips_one_layer() {
        assert_eq!(clean_cell("  \"hello\"  "), "hello");
        assert_eq!(clean_cell("|x|"), "x");
        assert_eq!(clean_cell("\"\"q\"\""), "\"q\"");
    }

    #[test]
    fn markdown_table_drops_frame_and_separator() {
        let input = "| name | age |\n|------|-----|\n| ada | 36 |\n| bob | 41 |\n";
        let (headers, rows) = read(input, ReadMode::Full);
        assert_eq!(headers, vec!["name", "age"]);
        assert_eq!(rows.len(), 2);
        assert_eq!(texts(&rows[1]), vec!["bob", "41"]);
    }

    #[test]
    fn short_rows_pad_by_mode() {
        let input = "a,b,c\n1,2\n";
        let (_, full) = read(input, ReadMode::Full);
        assert_eq!(full[0][2], Value::Null);

        let (_, preview) = read(input, ReadMode::Preview);
        assert_eq!(preview[0][2], Value::from(""));
    }

    #[test]
    fn empty_cells_are_null_in_full_mode_only() {
        let input = "a,b,c\n1,,3\n";
        let (_, full) = read(input, ReadMode::Full);
        assert_eq!(full[0][1], Value::Null);
        let (_, preview) = read(input, ReadMode::Preview);
        assert_eq!(preview[0][1], Value::from(""));
    }

    #[test]
    fn preview_reads_at_most_eleven_records() {
        let mut input = String::from("n\n");
        for i in 0..50 {
            input.push_str(&format!("{i}\n"));
        }
        let (_, rows) = read(&input, ReadMode::Preview);
        assert_eq!(rows.len(), 10);
        assert_eq!(rows[9][0], Value::from("9"));

        let (_, rows) = read(&input, ReadMode::Full);
        assert_eq!(rows.len(), 50);
    }

    #[test]
    fn separators_count_against_preview_budget() {
        let mut input = String::from("n\n---\n");
        for i in 0..20 {
            input.push_str(&format!("{i}\n"));
        }
        let (_, rows) = read(&input, ReadMode::Preview);
        assert_eq!(rows.len(), 9);
    }

    #[test]
    fn blank_lines_are_skipped() {
        let (headers, rows) = read("\n\na,b\n\n1,2\n\n", ReadMode::Full);
        assert_eq!(headers, vec!["a", "b"]);
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn unbalanced_quote_stays_on_its_line() {
        let (_, rows) = read("name,size\n\"ada,5\nbob,6\ncy,7\n", ReadMode::Full);
        assert_eq!(rows.len(), 3);
        assert_eq!(texts(&rows[0]), vec!["ada", "5"]);
        assert_eq!(texts(&rows[2]), vec!["cy", "7"]);

        let mut input = String::from("n\n\"open\n");
        for i in 0..30 {
            input.push_str(&format!("{i}\n"));
        }
        let (_, rows) = read(&input, ReadMode::Preview);
        assert_eq!(rows.len(), 10);
        assert_eq!(rows[0][0], Value::from("open"));
    }

    #[test]
    fn doubled_quotes_lose_only_the_outer_pair() {
        let (_, rows) = read("a,b\n\"say \"\"hi\"\"\",x\n", ReadMode::Full);
        assert_eq!(texts(&rows[0]), vec!["say \"\"hi\"\"", "x"]);
    }

    #[test]
    fn quoted_commas_still_split() {
        let (_, rows) = read("a,b\n\"x,y\",z\n", ReadMode::Full);
        assert_eq!(texts(&rows[0]), vec!["x", "y"]);
    }

    #[test]
    fn delimiter_only_line_is_a_null_row() {
        let (_, rows) = read("a,b\n1,2\n,\n   \n3,4\n", ReadMode::Full);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1], vec![Value::Null, Value::Null]);
        assert_eq!(texts(&rows[2]), vec!["3", "4"]);
    }

    #[test]
    fn whitespace_only_tab_line_is_skipped() {
        let (_, rows) = read("a\tb\n1\t2\n \t \n3\t4\n", ReadMode::Full);
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn empty_input_is_empty_source() {
        let err = read_delimited(Path::new("e.csv"), Cursor::new(Vec::new()), ReadMode::Preview)
            .unwrap_err();
        assert!(matches!(err, IngestionError::EmptySource { .. }));
    }
}
