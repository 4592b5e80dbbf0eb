use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, IngestionError};

use super::unified::SourceFormat;

/// Severity classification used for observer callbacks and alerting thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestionSeverity {
    /// Informational event.
    Info,
    /// Warning-level event (caller mistake, nothing broke).
    Warning,
    /// Error-level event (operation failed).
    Error,
    /// Critical error (I/O, store, or other infrastructure failures).
    Critical,
}

impl IngestionSeverity {
    /// Severity for a failed operation.
    pub fn for_error(e: &IngestionError) -> Self {
        match e.kind() {
            ErrorKind::Validation
            | ErrorKind::InvalidName
            | ErrorKind::Conflict
            | ErrorKind::SessionExpired => IngestionSeverity::Warning,
            ErrorKind::UnreadableFile | ErrorKind::EmptySource | ErrorKind::NoTableFound => {
                IngestionSeverity::Error
            }
            ErrorKind::LoadFailed | ErrorKind::Config | ErrorKind::Io => IngestionSeverity::Critical,
        }
    }
}

/// Which boundary operation an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Preview,
    Load,
}

/// Context about one preview or load attempt.
#[derive(Debug, Clone)]
pub struct IngestionContext {
    pub operation: Operation,
    /// Staged or local path of the source.
    pub path: PathBuf,
    pub format: SourceFormat,
    /// Sanitized target table, for loads.
    pub table: Option<String>,
}

/// Stats reported on success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestionStats {
    /// Preview rows returned, or rows inserted by a load.
    pub rows: usize,
    pub elapsed: Duration,
}

/// Observer interface for preview and load outcomes.
///
/// Implementors can record metrics, logs, or trigger alerts.
pub trait IngestionObserver: Send + Sync {
    /// Called when an operation succeeds.
    fn on_success(&self, _ctx: &IngestionContext, _stats: IngestionStats) {}

    /// Called when an operation fails.
    fn on_failure(&self, _ctx: &IngestionContext, _severity: IngestionSeverity, _error: &IngestionError) {}

    /// Called when a failure meets the alert threshold.
    ///
    /// Default behavior forwards to [`Self::on_failure`].
    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        self.on_failure(ctx, severity, error)
    }
}

/// An observer that fans out callbacks to a list of observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn IngestionObserver>>,
}

impl CompositeObserver {
    /// Create a new composite observer from a list of observers.
    pub fn new(observers: Vec<Arc<dyn IngestionObserver>>) -> Self {
        Self { observers }
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers_len", &self.observers.len())
            .finish()
    }
}

impl IngestionObserver for CompositeObserver {
    fn on_success(&self, ctx: &IngestionContext, stats: IngestionStats) {
        for o in &self.observers {
            o.on_success(ctx, stats);
        }
    }

    fn on_failure(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        for o in &self.observers {
            o.on_failure(ctx, severity, error);
        }
    }

    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        for o in &self.observers {
            o.on_alert(ctx, severity, error);
        }
    }
}

/// Emits observer events as `tracing` events.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl IngestionObserver for TracingObserver {
    fn on_success(&self, ctx: &IngestionContext, stats: IngestionStats) {
        tracing::info!(
            operation = ?ctx.operation,
            format = %ctx.format,
            path = %ctx.path.display(),
            table = ctx.table.as_deref().unwrap_or(""),
            rows = stats.rows,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "ingest ok"
        );
    }

    fn on_failure(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        tracing::warn!(
            operation = ?ctx.operation,
            ?severity,
            kind = %error.kind(),
            format = %ctx.format,
            path = %ctx.path.display(),
            table = ctx.table.as_deref().unwrap_or(""),
            "ingest failed: {error}"
        );
    }

    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &IngestionError) {
        tracing::error!(
            operation = ?ctx.operation,
            ?severity,
            kind = %error.kind(),
            format = %ctx.format,
            path = %ctx.path.display(),
            table = ctx.table.as_deref().unwrap_or(""),
            "ALERT ingest failed: {error}"
        );
    }
}

/// Report an outcome to `observer`, alerting when severity reaches `alert_at_or_above`.
pub(crate) fn report<T>(
    observer: Option<&Arc<dyn IngestionObserver>>,
    alert_at_or_above: IngestionSeverity,
    ctx: &IngestionContext,
    result: &Result<T, IngestionError>,
    stats: impl FnOnce(&T) -> IngestionStats,
) {
    let Some(obs) = observer else {
        return;
    };
    match result {
        Ok(value) => obs.on_success(ctx, stats(value)),
        Err(e) => {
            let sev = IngestionSeverity::for_error(e);
            obs.on_failure(ctx, sev, e);
            if sev >= alert_at_or_above {
                obs.on_alert(ctx, sev, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severities_order_by_impact() {
        let conflict = IngestionError::Conflict {
            table: "t".into(),
        };
        let failed = IngestionError::load_failed("t", "boom");
        let empty = IngestionError::EmptySource {
            path: PathBuf::from("x.csv"),
        };
        assert_eq!(IngestionSeverity::for_error(&conflict), IngestionSeverity::Warning);
        assert_eq!(IngestionSeverity::for_error(&empty), IngestionSeverity::Error);
        assert_eq!(IngestionSeverity::for_error(&failed), IngestionSeverity::Critical);
        assert!(IngestionSeverity::Critical > IngestionSeverity::Warning);
    }
}
