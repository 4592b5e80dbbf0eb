//! The two boundary operations: ingest-and-preview, then load.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::error::{IngestionError, IngestionResult};
use crate::ingestion::observability::report;
use crate::ingestion::{
    BridgeRegistry, IngestionContext, IngestionObserver, IngestionStats, Operation,
    PreviewSampler, ReaderOptions, SourceFormat,
};
use crate::load::{load_table, validate_selection, LoadJob, LoadOptions, LoadReport};
use crate::session::{SessionStore, StagingArea, UploadSession};
use crate::store::Store;
use crate::types::ColumnSpec;

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewResponse {
    pub headers: Vec<String>,
    /// At most ten rows, each an object keyed by header.
    pub preview: Vec<serde_json::Map<String, serde_json::Value>>,
    /// Redeemable once by [`Pipeline::load`].
    pub session_token: String,
}

/// A caller's load request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadRequest {
    pub target_table: String,
    /// Persisted column order.
    pub selected_columns: Vec<String>,
    pub session_token: String,
    /// Optional logical type per selected column, e.g. `"age" => "INT"`.
    #[serde(default)]
    pub column_types: HashMap<String, String>,
}

impl LoadRequest {
    /// Reject missing or malformed fields before anything touches storage.
    pub fn validate(&self) -> IngestionResult<()> {
        if self.target_table.trim().is_empty() {
            return Err(IngestionError::validation("target_table is required"));
        }
        if self.session_token.trim().is_empty() {
            return Err(IngestionError::validation("session_token is required"));
        }
        if self.selected_columns.is_empty() {
            return Err(IngestionError::validation("select at least one column"));
        }
        let mut seen = HashSet::with_capacity(self.selected_columns.len());
        for c in &self.selected_columns {
            if !seen.insert(c.as_str()) {
                return Err(IngestionError::validation(format!(
                    "column '{c}' selected more than once"
                )));
            }
        }
        Ok(())
    }

    fn column_specs(&self) -> Vec<ColumnSpec> {
        self.selected_columns
            .iter()
            .map(|name| match self.column_types.get(name) {
                Some(t) => ColumnSpec::new(name).with_type(t),
                None => ColumnSpec::new(name),
            })
            .collect()
    }
}

/// Upload, preview, and load against one store.
pub struct Pipeline<S: Store> {
    config: PipelineConfig,
    store: Mutex<S>,
    staging: StagingArea,
    sessions: SessionStore,
    reader: ReaderOptions,
    observer: Option<Arc<dyn IngestionObserver>>,
}

impl<S: Store> std::fmt::Debug for Pipeline<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("sessions", &self.sessions.len())
            .field("reader", &self.reader)
            .finish_non_exhaustive()
    }
}

impl<S: Store> Pipeline<S> {
    pub fn new(config: PipelineConfig, store: S) -> Self {
        Self {
            staging: StagingArea::new(&config.staging_dir),
            sessions: SessionStore::new(config.session_ttl()),
            store: Mutex::new(store),
            reader: ReaderOptions::default(),
            observer: None,
            config,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn IngestionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Replace the external-table bridges (e.g. to add an Access driver).
    pub fn with_bridges(mut self, bridges: BridgeRegistry) -> Self {
        self.reader.bridges = bridges;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Run `f` with exclusive access to the store.
    pub fn with_store<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        let mut store = self.store.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut store)
    }

    /// Stage `bytes`, parse a preview, and open an upload session.
    ///
    /// On any read failure the staged file is removed and no session is recorded.
    pub fn ingest_and_preview(
        &self,
        bytes: &[u8],
        original_name: &str,
    ) -> IngestionResult<PreviewResponse> {
        if original_name.trim().is_empty() {
            return Err(IngestionError::validation("original file name is required"));
        }
        let started = Instant::now();
        let (token, staged_path) = self.staging.stage(bytes, original_name)?;
        let format = SourceFormat::classify(&staged_path);
        tracing::info!(
            token = %token,
            original_name,
            %format,
            bytes = bytes.len(),
            "upload staged"
        );

        let ctx = IngestionContext {
            operation: Operation::Preview,
            path: staged_path.clone(),
            format,
            table: None,
        };
        let result = self.preview_staged(&staged_path, format);
        report(
            self.observer.as_ref(),
            self.config.alert_at_or_above,
            &ctx,
            &result,
            |p| IngestionStats {
                rows: p.row_count(),
                elapsed: started.elapsed(),
            },
        );

        let preview = match result {
            Ok(preview) => preview,
            Err(e) => {
                if let Err(io) = StagingArea::discard(&staged_path) {
                    tracing::warn!(path = %staged_path.display(), error = %io, "failed to remove rejected upload");
                }
                return Err(e);
            }
        };

        self.sessions.insert(UploadSession {
            session_id: token.clone(),
            original_name: original_name.to_owned(),
            staged_path,
            format,
            headers: preview.headers.clone(),
            created_at: Utc::now(),
        });

        Ok(PreviewResponse {
            preview: preview.json_rows(),
            headers: preview.headers,
            session_token: token,
        })
    }

    fn preview_staged(
        &self,
        path: &Path,
        format: SourceFormat,
    ) -> IngestionResult<crate::types::Preview> {
        let mut options = self.reader.clone();
        options.format = Some(format);
        PreviewSampler::new(options).sample(path)
    }

    /// Load the selected columns of an uploaded file into a new table.
    ///
    /// The session is consumed only when the load commits; after any failure it can be retried
    /// (for example with a different table name after a conflict).
    pub fn load(&self, request: &LoadRequest) -> IngestionResult<LoadReport> {
        request.validate()?;
        let token = request.session_token.as_str();
        if self.staging.path_for(token).is_none() {
            return Err(IngestionError::SessionExpired {
                token: token.to_owned(),
            });
        }
        let session = self.sessions.checkout(token, Utc::now())?;

        let ctx = IngestionContext {
            operation: Operation::Load,
            path: session.staged_path.clone(),
            format: session.format,
            table: Some(request.target_table.clone()),
        };
        let result = self.load_session(&session, request);
        report(
            self.observer.as_ref(),
            self.config.alert_at_or_above,
            &ctx,
            &result,
            |r| IngestionStats {
                rows: r.rows_inserted as usize,
                elapsed: r.elapsed,
            },
        );

        match &result {
            Ok(_) => {
                if let Err(e) = self.sessions.complete(token) {
                    tracing::warn!(token, error = %e, "failed to remove staged upload after load");
                }
            }
            Err(_) => self.sessions.restore(token),
        }
        result
    }

    fn load_session(
        &self,
        session: &UploadSession,
        request: &LoadRequest,
    ) -> IngestionResult<LoadReport> {
        let job = LoadJob::from_specs(&request.target_table, &request.column_specs())
            .with_session(&session.session_id);
        validate_selection(&session.headers, &job.columns)?;

        let options = LoadOptions {
            batch_size: self.config.batch_size,
            reader: self.reader.clone(),
        };
        self.with_store(|store| {
            load_table(store, &session.staged_path, session.format, &job, &options)
        })
    }

    /// Drop idle sessions older than the configured TTL, deleting their staged files.
    pub fn purge_expired(&self) -> usize {
        self.sessions.purge_expired(Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(columns: &[&str]) -> LoadRequest {
        LoadRequest {
            target_table: "people".into(),
            selected_columns: columns.iter().map(|c| c.to_string()).collect(),
            session_token: "upload-x.csv".into(),
            column_types: HashMap::new(),
        }
    }

    #[test]
    fn request_validation() {
        assert!(request(&["a"]).validate().is_ok());
        assert!(request(&[]).validate().is_err());
        assert!(request(&["a", "a"]).validate().is_err());

        let mut r = request(&["a"]);
        r.target_table = "  ".into();
        assert!(matches!(r.validate(), Err(IngestionError::Validation { .. })));

        let mut r = request(&["a"]);
        r.session_token.clear();
        assert!(r.validate().is_err());
    }

    #[test]
    fn column_types_attach_to_specs() {
        let mut r = request(&["name", "age"]);
        r.column_types.insert("age".into(), "INT".into());
        let specs = r.column_specs();
        assert_eq!(specs[0].logical_type, None);
        assert_eq!(specs[1].logical_type.as_deref(), Some("INT"));
    }

    #[test]
    fn load_request_deserializes_without_types() {
        let r: LoadRequest = serde_json::from_str(
            r#"{"target_table":"t","selected_columns":["a"],"session_token":"upload-1.csv"}"#,
        )
        .unwrap();
        assert!(r.column_types.is_empty());
    }
}
