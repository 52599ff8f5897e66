//! File-based session storage.
//!
//! One JSON file per session, named `{session_id}.json`, in a directory
//! created on startup.

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{debug, warn};

use sso_shared::types::SessionRecord;

use super::backend::{BackendError, SessionBackend};
use super::cookie::{id_prefix, is_valid_session_id};

#[derive(Debug, Clone)]
pub struct FileSessionBackend {
    directory: PathBuf,
}

impl FileSessionBackend {
    /// Creates the directory if it doesn't exist.
    pub fn new(directory: impl Into<PathBuf>) -> Result<Self, BackendError> {
        let directory = directory.into();
        std::fs::create_dir_all(&directory)?;
        Ok(Self { directory })
    }

    fn session_path(&self, session_id: &str) -> PathBuf {
        self.directory.join(format!("{}.json", session_id))
    }
}

#[async_trait]
impl SessionBackend for FileSessionBackend {
    async fn load(&self, session_id: &str) -> Result<Option<SessionRecord>, BackendError> {
        if !is_valid_session_id(session_id) {
            return Ok(None);
        }

        let content = match tokio::fs::read(self.session_path(session_id)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        Ok(Some(serde_json::from_slice(&content)?))
    }

    async fn save(&self, session_id: &str, record: &SessionRecord) -> Result<(), BackendError> {
        if !is_valid_session_id(session_id) {
            return Err(BackendError::Io(std::io::Error::new(
                ErrorKind::InvalidInput,
                "invalid session id",
            )));
        }

        let content = serde_json::to_vec(record)?;

        // Write then rename so a concurrent reader never sees a partial file.
        let path = self.session_path(session_id);
        let tmp = self.directory.join(format!("{}.json.tmp", session_id));
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &path).await?;

        debug!("Saved session file {}...", id_prefix(session_id));
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<(), BackendError> {
        if !is_valid_session_id(session_id) {
            return Ok(());
        }

        match tokio::fs::remove_file(self.session_path(session_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn prune_expired(&self, now: i64) -> Result<u64, BackendError> {
        let mut entries = tokio::fs::read_dir(&self.directory).await?;
        let mut pruned = 0u64;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }

            let Ok(content) = tokio::fs::read(&path).await else {
                continue;
            };
            match serde_json::from_slice::<SessionRecord>(&content) {
                Ok(record) if record.is_expired(now) => {
                    if tokio::fs::remove_file(&path).await.is_ok() {
                        pruned += 1;
                    }
                }
                Ok(_) => {}
                Err(e) => warn!("Skipping unreadable session file {}: {}", path.display(), e),
            }
        }

        Ok(pruned)
    }
}
