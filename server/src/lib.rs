//! Session and bearer-token authentication for a small web application.
//!
//! The binary in `main.rs` is a thin shell around [`AppState`] and
//! [`handlers::http::routes::build_router`].

pub mod auth;
pub mod gate;
pub mod handlers;
pub mod session;
pub mod users;

use std::convert::Infallible;
use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::Bytes;
use http_body_util::combinators::BoxBody;

use sso_shared::types::AppConfig;

use crate::auth::TokenService;
use crate::gate::AuthGate;
use crate::session::SessionStore;
use crate::users::{JsonUserStore, UserStore};

/// Request bodies are boxed so handlers can be driven by hyper's
/// `Incoming` and by in-memory bodies alike.
pub type RequestBody = BoxBody<Bytes, hyper::Error>;
pub type ResponseBody = BoxBody<Bytes, Infallible>;

/// Everything a handler needs, cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub tokens: Arc<TokenService>,
    pub sessions: Arc<SessionStore>,
    pub users: Arc<dyn UserStore>,
    pub gate: AuthGate,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("sessions", &self.sessions)
            .field("gate", &self.gate)
            .finish()
    }
}

impl AppState {
    pub fn new(
        config: AppConfig,
        tokens: TokenService,
        sessions: SessionStore,
        users: Arc<dyn UserStore>,
    ) -> Self {
        let gate = AuthGate::new(config.session.login_path.clone());
        Self {
            config: Arc::new(config),
            tokens: Arc::new(tokens),
            sessions: Arc::new(sessions),
            users,
            gate,
        }
    }

    /// Build the token service, session store and user store a validated
    /// config describes.
    pub async fn from_config(config: AppConfig) -> Result<Self> {
        let tokens =
            TokenService::from_config(&config.auth).context("Failed to set up token service")?;
        let sessions = SessionStore::from_config(&config.session)
            .context("Failed to set up session store")?;
        let users = JsonUserStore::load(&config.paths.users_file)
            .await
            .context("Failed to load user store")?;

        Ok(Self::new(config, tokens, sessions, Arc::new(users)))
    }
}
