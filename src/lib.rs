//! `tabular-ingest` turns an uploaded tabular file into a new relational table.
//!
//! The flow has two steps:
//!
//! 1. **Ingest and preview**: the upload is staged, its format is detected from the file extension,
//!    and the header list plus at most ten rows come back together with a session token.
//! 2. **Load**: the caller picks columns (optionally with logical types such as `DECIMAL(18,2)`)
//!    and a table name. The table is created and filled in one transaction; it either ends up
//!    complete or does not exist at all.
//!
//! ## What you can read
//!
//! **Source formats (classified by extension):**
//!
//! - **Delimited text**: any extension not listed below. The delimiter is sniffed from the first
//!   line (tab, then pipe, else comma), so `.csv`, `.tsv`, `.txt` and markdown tables all work.
//! - **Spreadsheets** (requires the Cargo feature `excel`, on by default): `.xlsx`, `.xls`,
//!   `.xlsm`, `.xlsb`, `.ods`. Only the first sheet is read.
//! - **External tables**: `.duckdb` / `.ddb` out of the box; `.mdb` / `.accdb` once a
//!   [`ingestion::TableBridge`] is registered. Only the first user table is read.
//!
//! ## Quick example: upload, preview, load
//!
//! ```no_run
//! use tabular_ingest::config::PipelineConfig;
//! use tabular_ingest::pipeline::{LoadRequest, Pipeline};
//! use tabular_ingest::store::DuckDbStore;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PipelineConfig::default();
//! let store = DuckDbStore::open(&config.database)?;
//! let pipeline = Pipeline::new(config, store);
//!
//! let upload = pipeline.ingest_and_preview(b"name,age\nada,36\n", "people.csv")?;
//! println!("headers={:?} rows={}", upload.headers, upload.preview.len());
//!
//! let report = pipeline.load(&LoadRequest {
//!     target_table: "People".into(),
//!     selected_columns: vec!["name".into(), "age".into()],
//!     session_token: upload.session_token,
//!     column_types: [("age".to_string(), "INT".to_string())].into(),
//! })?;
//! assert_eq!(report.table, "people");
//! # Ok(())
//! # }
//! ```
//!
//! Without sessions, [`ingestion::preview_path`] and [`load::load_table`] work on local paths.
//!
//! ## Modules
//!
//! - [`ingestion`]: format readers, preview sampling, observer hooks
//! - [`load`]: type mapping, table layout, batched inserts, the load transaction
//! - [`store`]: the relational store seam and the DuckDB backend
//! - [`session`]: staged uploads and their sessions
//! - [`pipeline`]: the two boundary operations
//! - [`config`]: TOML + environment configuration
//! - [`error`]: the error taxonomy

pub mod config;
pub mod error;
pub mod ingestion;
pub mod load;
pub mod pipeline;
pub mod session;
pub mod store;
pub mod types;

pub use error::{ErrorKind, IngestionError, IngestionResult};
