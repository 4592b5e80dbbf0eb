use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Convenience result type for ingest and load operations.
pub type IngestionResult<T> = Result<T, IngestionError>;

/// Error type returned by the preview and load pipeline.
///
/// Every failure is reported to the caller as-is; nothing is retried. Use [`IngestionError::kind`]
/// to map an error onto a transport status.
#[derive(Debug, Error)]
pub enum IngestionError {
    /// A required request field is missing or malformed. Raised before any storage access.
    #[error("validation failed: {message}")]
    Validation { message: String },

    /// The requested table name is empty once non `[A-Za-z0-9_]` characters are removed.
    #[error("invalid table name '{requested}': nothing left after sanitizing")]
    InvalidName { requested: String },

    /// The source could not be opened or parsed (corrupt, locked, missing driver, bad encoding).
    #[error("could not read {}: {message}", path.display())]
    UnreadableFile { path: PathBuf, message: String },

    /// The source has a header but no data rows.
    #[error("{} appears empty: no data rows after the header", path.display())]
    EmptySource { path: PathBuf },

    /// An external database file contains no user tables.
    #[error("no tables found in {}", path.display())]
    NoTableFound { path: PathBuf },

    /// The target table already exists in the store.
    #[error("table '{table}' already exists; choose a different name")]
    Conflict { table: String },

    /// The upload session is unknown, already consumed, expired, or its staged file is gone.
    #[error("upload session '{token}' has expired; upload the file again")]
    SessionExpired { token: String },

    /// DDL or a batch insert failed. The load transaction has been rolled back.
    #[error("loading table '{table}' failed: {message}")]
    LoadFailed { table: String, message: String },

    /// Invalid pipeline configuration.
    #[error("invalid configuration: {message}")]
    Config { message: String },

    /// Staging I/O error (writing or removing an uploaded artifact).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Stable, transport-agnostic classification of an [`IngestionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    InvalidName,
    UnreadableFile,
    EmptySource,
    NoTableFound,
    Conflict,
    SessionExpired,
    LoadFailed,
    Config,
    Io,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::InvalidName => "invalid_name",
            ErrorKind::UnreadableFile => "unreadable_file",
            ErrorKind::EmptySource => "empty_source",
            ErrorKind::NoTableFound => "no_table_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::SessionExpired => "session_expired",
            ErrorKind::LoadFailed => "load_failed",
            ErrorKind::Config => "config",
            ErrorKind::Io => "io",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl IngestionError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            IngestionError::Validation { .. } => ErrorKind::Validation,
            IngestionError::InvalidName { .. } => ErrorKind::InvalidName,
            IngestionError::UnreadableFile { .. } => ErrorKind::UnreadableFile,
            IngestionError::EmptySource { .. } => ErrorKind::EmptySource,
            IngestionError::NoTableFound { .. } => ErrorKind::NoTableFound,
            IngestionError::Conflict { .. } => ErrorKind::Conflict,
            IngestionError::SessionExpired { .. } => ErrorKind::SessionExpired,
            IngestionError::LoadFailed { .. } => ErrorKind::LoadFailed,
            IngestionError::Config { .. } => ErrorKind::Config,
            IngestionError::Io(_) => ErrorKind::Io,
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        IngestionError::Validation {
            message: message.into(),
        }
    }

    pub(crate) fn unreadable(path: impl Into<PathBuf>, message: impl fmt::Display) -> Self {
        IngestionError::UnreadableFile {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub(crate) fn load_failed(table: &str, message: impl fmt::Display) -> Self {
        IngestionError::LoadFailed {
            table: table.to_owned(),
            message: message.to_string(),
        }
    }
}
