//! The per-request decision point in front of protected pages.
//!
//! A protected route carries a [`RouteHandler`]. Before the handler runs the
//! gate resolves the request's session:
//!
//!   no live session   -> 302 to the login path, handler never invoked
//!   store failure     -> 500, never treated as "logged out"
//!   live session      -> handler invoked with what its variant asks for

use std::future::Future;
use std::path::{Component, Path};
use std::pin::Pin;

use anyhow::Result;
use http::HeaderMap;
use hyper::{Request, Response, StatusCode};
use tracing::{debug, error, warn};

use sso_shared::types::Identity;

use crate::handlers::http::utils::{deliver_redirect, json_response};
use crate::session::{SessionError, SessionStore};
use crate::{AppState, RequestBody, ResponseBody};

pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Response<ResponseBody>>> + Send>>;

type NoArgFn = Box<dyn Fn(AppState) -> HandlerFuture + Send + Sync>;
type WithSessionFn =
    Box<dyn Fn(Request<RequestBody>, AppState, Identity) -> HandlerFuture + Send + Sync>;
type WithPathAndSessionFn = Box<dyn Fn(String, AppState, Identity) -> HandlerFuture + Send + Sync>;

/// What a protected route's loader needs from the gate.
pub enum RouteHandler {
    /// Only needs the request to be authenticated.
    NoArg(NoArgFn),
    /// Receives the request and the session identity.
    WithSession(WithSessionFn),
    /// Receives the cleaned page name (`/` is `index`) and the identity.
    WithPathAndSession(WithPathAndSessionFn),
}

impl RouteHandler {
    pub fn no_arg<F, Fut>(handler: F) -> Self
    where
        F: Fn(AppState) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<ResponseBody>>> + Send + 'static,
    {
        Self::NoArg(Box::new(move |state| Box::pin(handler(state))))
    }

    pub fn with_session<F, Fut>(handler: F) -> Self
    where
        F: Fn(Request<RequestBody>, AppState, Identity) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<ResponseBody>>> + Send + 'static,
    {
        Self::WithSession(Box::new(move |req, state, identity| {
            Box::pin(handler(req, state, identity))
        }))
    }

    pub fn with_path_and_session<F, Fut>(handler: F) -> Self
    where
        F: Fn(String, AppState, Identity) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<ResponseBody>>> + Send + 'static,
    {
        Self::WithPathAndSession(Box::new(move |page, state, identity| {
            Box::pin(handler(page, state, identity))
        }))
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::NoArg(_) => "no-arg",
            Self::WithSession(_) => "with-session",
            Self::WithPathAndSession(_) => "with-path-and-session",
        }
    }
}

impl std::fmt::Debug for RouteHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RouteHandler::{}", self.kind())
    }
}

/// Outcome of resolving a request's session.
#[derive(Debug)]
pub enum GateState {
    Redirect(String),
    Failed,
    Authenticated(Identity),
}

#[derive(Debug, Clone)]
pub struct AuthGate {
    login_path: String,
}

impl AuthGate {
    pub fn new(login_path: impl Into<String>) -> Self {
        Self {
            login_path: login_path.into(),
        }
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    pub async fn resolve(&self, sessions: &SessionStore, headers: &HeaderMap) -> GateState {
        match sessions.get(headers).await {
            Ok(identity) => GateState::Authenticated(identity),
            Err(SessionError::NoSession) => GateState::Redirect(self.login_path.clone()),
            Err(e) => {
                error!("Session lookup failed: {}", e);
                GateState::Failed
            }
        }
    }

    /// Resolve the session and, if it is live, run `handler`.
    pub async fn serve(
        &self,
        handler: &RouteHandler,
        req: Request<RequestBody>,
        state: AppState,
    ) -> Result<Response<ResponseBody>> {
        let path = req.uri().path().to_string();

        let identity = match self.resolve(&state.sessions, req.headers()).await {
            GateState::Authenticated(identity) => identity,
            GateState::Redirect(location) => {
                debug!("No session for {}, redirecting to {}", path, location);
                return deliver_redirect(&location, StatusCode::FOUND);
            }
            GateState::Failed => return json_response::internal_error(),
        };

        debug!("Gate passed {} for {} ({:?})", path, identity.name, handler);

        let result = match handler {
            RouteHandler::NoArg(h) => h(state).await,
            RouteHandler::WithSession(h) => h(req, state, identity).await,
            RouteHandler::WithPathAndSession(h) => match page_name(&path) {
                Some(page) => h(page, state, identity).await,
                None => {
                    warn!("Rejected page path: {}", path);
                    return json_response::deliver_error_json(
                        "NOT_FOUND",
                        "Page not found",
                        StatusCode::NOT_FOUND,
                    );
                }
            },
        };

        result.or_else(|e| {
            error!("Protected handler for {} failed: {:#}", path, e);
            json_response::internal_error()
        })
    }
}

/// The page a request path names: `/` is `index`, `/welcome/` is `welcome`.
/// Paths that try to leave the page directory have no page name.
pub fn page_name(path: &str) -> Option<String> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return Some("index".to_string());
    }
    if trimmed.contains('\\') {
        return None;
    }

    let mut parts = Vec::new();
    for component in Path::new(trimmed).components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            _ => return None,
        }
    }
    Some(parts.join("/"))
}
