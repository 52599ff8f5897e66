use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use sso_shared::types::SessionRecord;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt session data: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("random source failed: {0}")]
    Random(String),
}

/// Persistence for session records, keyed by session id.
#[async_trait]
pub trait SessionBackend: Send + Sync {
    async fn load(&self, session_id: &str) -> Result<Option<SessionRecord>, BackendError>;

    async fn save(&self, session_id: &str, record: &SessionRecord) -> Result<(), BackendError>;

    /// Removing an absent session is not an error.
    async fn delete(&self, session_id: &str) -> Result<(), BackendError>;

    /// Remove every record expired at `now`; returns how many were removed.
    async fn prune_expired(&self, now: i64) -> Result<u64, BackendError>;
}

/// In-process session storage. Sessions do not survive a restart.
#[derive(Debug, Default)]
pub struct MemorySessionBackend {
    sessions: RwLock<HashMap<String, SessionRecord>>,
}

impl MemorySessionBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl SessionBackend for MemorySessionBackend {
    async fn load(&self, session_id: &str) -> Result<Option<SessionRecord>, BackendError> {
        Ok(self.sessions.read().await.get(session_id).cloned())
    }

    async fn save(&self, session_id: &str, record: &SessionRecord) -> Result<(), BackendError> {
        self.sessions
            .write()
            .await
            .insert(session_id.to_owned(), record.clone());
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<(), BackendError> {
        self.sessions.write().await.remove(session_id);
        Ok(())
    }

    async fn prune_expired(&self, now: i64) -> Result<u64, BackendError> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, record| !record.is_expired(now));
        Ok((before - sessions.len()) as u64)
    }
}
