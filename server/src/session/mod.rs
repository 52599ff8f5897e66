//! Server-side sessions keyed by a signed, cookie-carried session id.

pub mod backend;
pub mod cookie;
pub mod file_store;

use std::sync::Arc;
use std::time::Duration;

use http::HeaderMap;
use http::header::SET_COOKIE;
use thiserror::Error;
use tracing::{debug, info, warn};

use sso_shared::types::server_config::{ConfigError, SessionBackendKind, SessionConfig};
use sso_shared::types::{Identity, SessionRecord};

use crate::auth::SecretKey;
use crate::auth::token::unix_now;
use crate::handlers::http::utils::headers;

pub use self::backend::{BackendError, MemorySessionBackend, SessionBackend};
pub use self::file_store::FileSessionBackend;

#[derive(Debug, Error)]
pub enum SessionError {
    /// The request carries no live session. Callers redirect to login.
    #[error("no session")]
    NoSession,

    #[error("session store error: {0}")]
    Store(#[source] BackendError),

    #[error("failed to persist session: {0}")]
    Persistence(#[source] BackendError),
}

pub struct SessionStore {
    backend: Arc<dyn SessionBackend>,
    key: SecretKey,
    cookie_name: String,
    max_age: Duration,
    secure_cookie: bool,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("cookie_name", &self.cookie_name)
            .field("max_age", &self.max_age)
            .field("secure_cookie", &self.secure_cookie)
            .finish()
    }
}

impl SessionStore {
    pub fn new(backend: Arc<dyn SessionBackend>, key: SecretKey) -> Self {
        let defaults = SessionConfig::default();
        let max_age = Duration::from_secs(defaults.max_age_secs());
        Self {
            backend,
            key,
            cookie_name: defaults.cookie_name,
            max_age,
            secure_cookie: false,
        }
    }

    pub fn with_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    pub fn with_secure_cookie(mut self, secure: bool) -> Self {
        self.secure_cookie = secure;
        self
    }

    pub fn from_config(config: &SessionConfig) -> Result<Self, ConfigError> {
        let key = config
            .resolved_session_key()
            .ok_or_else(|| ConfigError::InvalidConfig("session key is not set".into()))?;

        let backend: Arc<dyn SessionBackend> = match config.backend {
            SessionBackendKind::Memory => Arc::new(MemorySessionBackend::new()),
            SessionBackendKind::File => Arc::new(
                FileSessionBackend::new(config.store_path()).map_err(|e| {
                    ConfigError::InvalidConfig(format!(
                        "cannot open session directory {}: {}",
                        config.store_dir, e
                    ))
                })?,
            ),
        };

        Ok(Self::new(backend, SecretKey::from(key))
            .with_cookie_name(config.cookie_name.clone())
            .with_max_age(Duration::from_secs(config.max_age_secs()))
            .with_secure_cookie(config.secure_cookie))
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// The verified session id carried by `request`, if any.
    fn session_id(&self, request: &HeaderMap) -> Option<String> {
        let value = headers::get_cookie(request, &self.cookie_name)?;
        cookie::verify_cookie_value(&value, &self.key)
    }

    /// Start a session for `identity` and attach its cookie to `response`.
    ///
    /// Always mints a new session id; a session the request already carried
    /// is destroyed first.
    pub async fn set(
        &self,
        response: &mut HeaderMap,
        request: &HeaderMap,
        identity: &Identity,
    ) -> Result<(), SessionError> {
        if let Some(old) = self.session_id(request) {
            debug!("Replacing session {}...", cookie::id_prefix(&old));
            self.backend
                .delete(&old)
                .await
                .map_err(SessionError::Persistence)?;
        }

        let session_id = cookie::generate_session_id()
            .map_err(|e| SessionError::Persistence(BackendError::Random(e.to_string())))?;

        let now = unix_now();
        let lifetime = i64::try_from(self.max_age.as_secs()).unwrap_or(i64::MAX);
        let record = SessionRecord {
            id: Some(identity.id.clone().unwrap_or_else(|| session_id.clone())),
            name: identity.name.clone(),
            admin: identity.is_admin,
            created_at: now,
            expires_at: now.saturating_add(lifetime),
        };

        self.backend
            .save(&session_id, &record)
            .await
            .map_err(SessionError::Persistence)?;

        let value = cookie::sign_session_id(&session_id, &self.key);
        let set_cookie = headers::create_persistent_cookie(
            &self.cookie_name,
            &value,
            self.max_age,
            self.secure_cookie,
        )
        .map_err(cookie_error)?;
        response.append(SET_COOKIE, set_cookie);

        info!(
            "Session {}... started for {}",
            cookie::id_prefix(&session_id),
            identity.name
        );
        Ok(())
    }

    /// The identity of the session `request` belongs to.
    pub async fn get(&self, request: &HeaderMap) -> Result<Identity, SessionError> {
        let session_id = self.session_id(request).ok_or(SessionError::NoSession)?;

        let record = self
            .backend
            .load(&session_id)
            .await
            .map_err(SessionError::Store)?
            .ok_or(SessionError::NoSession)?;

        if record.is_expired(unix_now()) {
            debug!("Session {}... expired", cookie::id_prefix(&session_id));
            if let Err(e) = self.backend.delete(&session_id).await {
                warn!("Failed to remove expired session: {}", e);
            }
            return Err(SessionError::NoSession);
        }

        let id = record.id.ok_or(SessionError::NoSession)?;
        Ok(Identity {
            id: Some(id),
            name: record.name,
            email: None,
            is_admin: record.admin,
        })
    }

    /// Destroy the session (if any) and expire the cookie on the client.
    pub async fn end(&self, response: &mut HeaderMap, request: &HeaderMap) -> Result<(), SessionError> {
        if let Some(session_id) = self.session_id(request) {
            self.backend
                .delete(&session_id)
                .await
                .map_err(SessionError::Persistence)?;
            info!("Session {}... ended", cookie::id_prefix(&session_id));
        }

        let expired =
            headers::delete_cookie(&self.cookie_name, self.secure_cookie).map_err(cookie_error)?;
        response.append(SET_COOKIE, expired);
        Ok(())
    }

    pub async fn prune_expired(&self) -> Result<u64, SessionError> {
        self.backend
            .prune_expired(unix_now())
            .await
            .map_err(SessionError::Store)
    }
}

fn cookie_error(e: anyhow::Error) -> SessionError {
    SessionError::Persistence(BackendError::Io(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        e.to_string(),
    )))
}
