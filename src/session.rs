//! Upload sessions and the staging directory behind them.
//!
//! An upload is written to the staging directory as `upload-<uuid><.ext>`; that file name is the
//! session token. A session is redeemable by exactly one successful load. Sessions that are never
//! loaded expire after the configured TTL.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::error::{IngestionError, IngestionResult};
use crate::ingestion::SourceFormat;

const TOKEN_PREFIX: &str = "upload-";

/// Writes uploaded bytes to disk and removes them again.
#[derive(Debug, Clone)]
pub struct StagingArea {
    dir: PathBuf,
}

impl StagingArea {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Persist `bytes`, keeping the extension of `original_name`. Returns `(token, path)`.
    pub fn stage(&self, bytes: &[u8], original_name: &str) -> IngestionResult<(String, PathBuf)> {
        fs::create_dir_all(&self.dir)?;
        let ext = Path::new(original_name)
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|e| format!(".{}", e.to_ascii_lowercase()))
            .unwrap_or_default();
        let token = format!("{TOKEN_PREFIX}{}{ext}", uuid::Uuid::new_v4());
        let path = self.dir.join(&token);
        fs::write(&path, bytes)?;
        tracing::debug!(path = %path.display(), bytes = bytes.len(), "staged upload");
        Ok((token, path))
    }

    /// Path for a token, or `None` if the token could name something outside the staging dir.
    pub fn path_for(&self, token: &str) -> Option<PathBuf> {
        let well_formed = token.starts_with(TOKEN_PREFIX)
            && !token.contains(['/', '\\'])
            && !token.contains("..");
        well_formed.then(|| self.dir.join(token))
    }

    /// Remove a staged file. A file that is already gone is not an error.
    pub fn discard(path: &Path) -> io::Result<()> {
        match fs::remove_file(path) {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "removed staged upload");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// A parsed upload waiting to be loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadSession {
    /// Token handed to the client; equal to the staged file name.
    pub session_id: String,
    pub original_name: String,
    pub staged_path: PathBuf,
    pub format: SourceFormat,
    pub headers: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl UploadSession {
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.created_at > ttl
    }
}

#[derive(Debug)]
struct Entry {
    session: UploadSession,
    checked_out: bool,
}

/// In-memory registry of upload sessions keyed by token.
#[derive(Debug)]
pub struct SessionStore {
    ttl: Duration,
    sessions: Mutex<HashMap<String, Entry>>,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn insert(&self, session: UploadSession) {
        let mut sessions = self.lock();
        sessions.insert(
            session.session_id.clone(),
            Entry {
                session,
                checked_out: false,
            },
        );
    }

    pub fn get(&self, token: &str) -> Option<UploadSession> {
        self.lock().get(token).map(|e| e.session.clone())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take exclusive use of a session for one load.
    ///
    /// Unknown, already checked-out, expired, or artifact-less sessions fail with
    /// [`IngestionError::SessionExpired`].
    pub fn checkout(&self, token: &str, now: DateTime<Utc>) -> IngestionResult<UploadSession> {
        let expired = || IngestionError::SessionExpired {
            token: token.to_owned(),
        };
        let mut sessions = self.lock();
        let entry = sessions.get_mut(token).ok_or_else(expired)?;
        if entry.checked_out
            || entry.session.is_expired(now, self.ttl)
            || !entry.session.staged_path.is_file()
        {
            return Err(expired());
        }
        entry.checked_out = true;
        Ok(entry.session.clone())
    }

    /// Return a checked-out session after a failed load so it can be retried.
    pub fn restore(&self, token: &str) {
        if let Some(entry) = self.lock().get_mut(token) {
            entry.checked_out = false;
        }
    }

    /// Drop a session after a committed load and delete its staged file.
    pub fn complete(&self, token: &str) -> IngestionResult<()> {
        let removed = self.lock().remove(token);
        if let Some(entry) = removed {
            StagingArea::discard(&entry.session.staged_path)?;
        }
        Ok(())
    }

    /// Remove idle sessions older than the TTL along with their staged files.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let expired: Vec<Entry> = {
            let mut sessions = self.lock();
            let tokens: Vec<String> = sessions
                .iter()
                .filter(|(_, e)| !e.checked_out && e.session.is_expired(now, self.ttl))
                .map(|(token, _)| token.clone())
                .collect();
            tokens
                .iter()
                .filter_map(|token| sessions.remove(token))
                .collect()
        };

        for entry in &expired {
            if let Err(e) = StagingArea::discard(&entry.session.staged_path) {
                tracing::warn!(
                    path = %entry.session.staged_path.display(),
                    error = %e,
                    "failed to remove expired upload"
                );
            }
        }
        if !expired.is_empty() {
            tracing::info!(purged = expired.len(), "purged expired upload sessions");
        }
        expired.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(staging: &StagingArea, created_at: DateTime<Utc>) -> UploadSession {
        let (token, path) = staging.stage(b"a,b\n1,2\n", "data.CSV").unwrap();
        UploadSession {
            session_id: token,
            original_name: "data.CSV".into(),
            staged_path: path,
            format: SourceFormat::DelimitedText,
            headers: vec!["a".into(), "b".into()],
            created_at,
        }
    }

    #[test]
    fn staged_names_keep_lowercased_extension() {
        let dir = tempfile::tempdir().unwrap();
        let staging = StagingArea::new(dir.path().join("uploads"));
        let (token, path) = staging.stage(b"x", "Report.XLSX").unwrap();
        assert!(token.starts_with("upload-"));
        assert!(token.ends_with(".xlsx"));
        assert_eq!(path.file_name().unwrap().to_str().unwrap(), token);
        assert_eq!(staging.path_for(&token), Some(path));
        assert_eq!(staging.path_for("../etc/passwd"), None);
    }

    #[test]
    fn checkout_is_exclusive_until_restored() {
        let dir = tempfile::tempdir().unwrap();
        let staging = StagingArea::new(dir.path());
        let store = SessionStore::new(Duration::hours(1));
        let now = Utc::now();
        let s = session(&staging, now);
        let token = s.session_id.clone();
        store.insert(s);

        store.checkout(&token, now).unwrap();
        let err = store.checkout(&token, now).unwrap_err();
        assert!(matches!(err, IngestionError::SessionExpired { .. }));

        store.restore(&token);
        assert!(store.checkout(&token, now).is_ok());
    }

    #[test]
    fn complete_deletes_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let staging = StagingArea::new(dir.path());
        let store = SessionStore::new(Duration::hours(1));
        let s = session(&staging, Utc::now());
        let (token, path) = (s.session_id.clone(), s.staged_path.clone());
        store.insert(s);

        store.complete(&token).unwrap();
        assert!(!path.exists());
        assert!(store.get(&token).is_none());
    }

    #[test]
    fn expired_and_missing_artifacts_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let staging = StagingArea::new(dir.path());
        let store = SessionStore::new(Duration::minutes(5));
        let now = Utc::now();

        let old = session(&staging, now - Duration::minutes(10));
        let old_token = old.session_id.clone();
        store.insert(old);
        assert!(store.checkout(&old_token, now).is_err());

        let fresh = session(&staging, now);
        let fresh_token = fresh.session_id.clone();
        fs::remove_file(&fresh.staged_path).unwrap();
        store.insert(fresh);
        assert!(store.checkout(&fresh_token, now).is_err());
    }

    #[test]
    fn purge_removes_only_expired() {
        let dir = tempfile::tempdir().unwrap();
        let staging = StagingArea::new(dir.path());
        let store = SessionStore::new(Duration::minutes(5));
        let now = Utc::now();

        let old = session(&staging, now - Duration::minutes(10));
        let old_path = old.staged_path.clone();
        store.insert(old);
        store.insert(session(&staging, now));

        assert_eq!(store.purge_expired(now), 1);
        assert_eq!(store.len(), 1);
        assert!(!old_path.exists());
    }
}
