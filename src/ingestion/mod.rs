//! Reading tabular sources.
//!
//! Most callers should use [`open_source`] (from [`unified`]) or [`preview_path`] (from
//! [`preview`]), which:
//!
//! - classify the source by file extension (or use a format forced via [`ReaderOptions`])
//! - return the header list and the rows, lazily where the format allows it
//!
//! Format-specific readers live under:
//! - [`delimited`]
//! - `excel` (requires the Cargo feature `excel`)
//! - [`external`]

pub mod delimited;
#[cfg(feature = "excel")]
pub mod excel;
pub mod external;
pub mod observability;
pub mod preview;
pub mod unified;

pub use external::{BridgeConnection, BridgeRegistry, TableBridge, TableEntry, TableKind};
pub use observability::{
    CompositeObserver, IngestionContext, IngestionObserver, IngestionSeverity, IngestionStats,
    Operation, TracingObserver,
};
pub use preview::{preview_path, PreviewSampler};
pub use unified::{
    open_source, FormatReader, ReadMode, ReaderOptions, RowIter, SourceFormat, TabularSource,
    PREVIEW_ROW_LIMIT,
};
