//! Bounded preview of a source for UI feedback.

use std::path::Path;

use crate::error::{IngestionError, IngestionResult};
use crate::types::Preview;

use super::unified::{open_source, ReadMode, ReaderOptions, PREVIEW_ROW_LIMIT};

/// Wraps [`open_source`] in preview mode and collects at most [`PREVIEW_ROW_LIMIT`] rows.
#[derive(Debug, Clone, Default)]
pub struct PreviewSampler {
    options: ReaderOptions,
}

impl PreviewSampler {
    pub fn new(options: ReaderOptions) -> Self {
        Self { options }
    }

    /// Read the header list and the first data rows of `path`.
    ///
    /// Fails with [`IngestionError::EmptySource`] when the source has no data rows.
    pub fn sample(&self, path: impl AsRef<Path>) -> IngestionResult<Preview> {
        let path = path.as_ref();
        let source = open_source(path, ReadMode::Preview, &self.options)?;

        let rows = source
            .rows
            .take(PREVIEW_ROW_LIMIT)
            .collect::<IngestionResult<Vec<_>>>()?;
        if rows.is_empty() {
            return Err(IngestionError::EmptySource {
                path: path.to_path_buf(),
            });
        }

        Ok(Preview {
            headers: source.headers,
            rows,
        })
    }
}

/// Preview `path` with default reader options.
pub fn preview_path(path: impl AsRef<Path>) -> IngestionResult<Preview> {
    PreviewSampler::default().sample(path)
}
