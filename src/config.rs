//! Pipeline configuration.
//!
//! Loaded from TOML; every field has a default, so an empty file is valid. Environment variables
//! override file values:
//!
//! - `TABULAR_INGEST_BATCH_SIZE`
//! - `TABULAR_INGEST_STAGING_DIR`
//! - `TABULAR_INGEST_SESSION_TTL_SECS`
//! - `TABULAR_INGEST_DATABASE`

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{IngestionError, IngestionResult};
use crate::ingestion::IngestionSeverity;
use crate::load::DEFAULT_BATCH_SIZE;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Rows per multi-row insert.
    pub batch_size: usize,
    /// Where uploads are staged between preview and load.
    pub staging_dir: PathBuf,
    /// Idle upload sessions older than this are purged.
    pub session_ttl_secs: u64,
    /// DuckDB database file that receives loaded tables.
    pub database: PathBuf,
    /// Failures at or above this severity are reported through `on_alert`.
    pub alert_at_or_above: IngestionSeverity,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            staging_dir: PathBuf::from("uploads"),
            session_ttl_secs: 3600,
            database: PathBuf::from("tabular.duckdb"),
            alert_at_or_above: IngestionSeverity::Critical,
        }
    }
}

impl PipelineConfig {
    /// Read and validate a TOML file. Environment overrides are applied separately.
    pub fn from_file(path: impl AsRef<Path>) -> IngestionResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| IngestionError::Config {
            message: format!("failed to read {}: {e}", path.display()),
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> IngestionResult<Self> {
        let config: PipelineConfig = toml::from_str(content).map_err(|e| IngestionError::Config {
            message: format!("failed to parse config: {e}"),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `TABULAR_INGEST_*` environment variables, then re-validate.
    pub fn apply_env_overrides(&mut self) -> IngestionResult<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> IngestionResult<()> {
        if let Some(v) = lookup("TABULAR_INGEST_BATCH_SIZE") {
            self.batch_size = parse_env("TABULAR_INGEST_BATCH_SIZE", &v)?;
        }
        if let Some(v) = lookup("TABULAR_INGEST_STAGING_DIR") {
            self.staging_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("TABULAR_INGEST_SESSION_TTL_SECS") {
            self.session_ttl_secs = parse_env("TABULAR_INGEST_SESSION_TTL_SECS", &v)?;
        }
        if let Some(v) = lookup("TABULAR_INGEST_DATABASE") {
            self.database = PathBuf::from(v);
        }
        self.validate()
    }

    pub fn validate(&self) -> IngestionResult<()> {
        if self.batch_size == 0 {
            return Err(IngestionError::Config {
                message: "batch_size cannot be 0".to_string(),
            });
        }
        if self.session_ttl_secs == 0 {
            return Err(IngestionError::Config {
                message: "session_ttl_secs cannot be 0".to_string(),
            });
        }
        Ok(())
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::try_from(self.session_ttl_secs).unwrap_or(i64::MAX))
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> IngestionResult<T> {
    value.trim().parse().map_err(|_| IngestionError::Config {
        message: format!("invalid {key} value: {value}"),
    })
}
