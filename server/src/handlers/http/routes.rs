use std::future::Future;

use anyhow::{Context, Result};
use hyper::{Method, Request, Response, StatusCode};
use tracing::{debug, warn};

use sso_shared::types::Identity;

use crate::gate::{HandlerFuture, RouteHandler};
use crate::handlers::http::utils::*;
use crate::handlers::http::{auth, pages};
use crate::{AppState, RequestBody, ResponseBody};

// ---------------------------------------------------------------------------
// Handler type aliases
// ---------------------------------------------------------------------------
//
// Three tiers:
//
//   OpenHandler    no auth.  Receives (req, state).
//                  Use for: /login, /register, /logout, /health, token endpoints.
//
//   RouteHandler   session cookie, resolved by the gate (see gate.rs).
//                  No session redirects to the login page.
//
//   BearerHandler  `Authorization: Bearer <token>`, verified by signature.
//                  Receives (req, state, identity). Failure is 401 JSON.

type OpenHandler = Box<dyn Fn(Request<RequestBody>, AppState) -> HandlerFuture + Send + Sync>;

type BearerHandler =
    Box<dyn Fn(Request<RequestBody>, AppState, Identity) -> HandlerFuture + Send + Sync>;

// ---------------------------------------------------------------------------
// RouteKind
// ---------------------------------------------------------------------------

enum RouteKind {
    /// No authentication check.
    Open(OpenHandler),

    /// Session-protected; dispatched through the auth gate.
    Protected(RouteHandler),

    /// Bearer token only, never redirects.
    Bearer(BearerHandler),
}

// ---------------------------------------------------------------------------
// Route
// ---------------------------------------------------------------------------

struct Route {
    method: Method,
    path: String,
    kind: RouteKind,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub struct Router {
    routes: Vec<Route>,
    web_dir: Option<String>,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("routes_count", &self.routes.len())
            .field("web_dir", &self.web_dir)
            .finish()
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            web_dir: None,
        }
    }

    /// Serve static files from here instead of `paths.web_dir`.
    pub fn with_web_dir(mut self, web_dir: String) -> Self {
        self.web_dir = Some(web_dir);
        self
    }

    fn open<F, Fut>(mut self, method: Method, path: &str, handler: F) -> Self
    where
        F: Fn(Request<RequestBody>, AppState) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<ResponseBody>>> + Send + 'static,
    {
        self.routes.push(Route {
            method,
            path: path.to_string(),
            kind: RouteKind::Open(Box::new(move |req, state| Box::pin(handler(req, state)))),
        });
        self
    }

    // ── Open (no auth) ────────────────────────────────────────────────────────

    /// GET with no authentication, for public pages and health checks.
    pub fn get<F, Fut>(self, path: &str, handler: F) -> Self
    where
        F: Fn(Request<RequestBody>, AppState) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<ResponseBody>>> + Send + 'static,
    {
        self.open(Method::GET, path, handler)
    }

    /// POST with no authentication, for login / logout / token endpoints.
    pub fn post<F, Fut>(self, path: &str, handler: F) -> Self
    where
        F: Fn(Request<RequestBody>, AppState) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<ResponseBody>>> + Send + 'static,
    {
        self.open(Method::POST, path, handler)
    }

    // ── Session (auth gate) ──────────────────────────────────────────────────

    /// GET behind the auth gate. The handler only runs for a live session.
    pub fn get_protected(mut self, path: &str, handler: RouteHandler) -> Self {
        self.routes.push(Route {
            method: Method::GET,
            path: path.to_string(),
            kind: RouteKind::Protected(handler),
        });
        self
    }

    // ── Bearer token ─────────────────────────────────────────────────────────

    /// GET guarded by a bearer token. Handlers receive the token's identity
    /// and must not verify the token again.
    pub fn get_bearer<F, Fut>(mut self, path: &str, handler: F) -> Self
    where
        F: Fn(Request<RequestBody>, AppState, Identity) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<ResponseBody>>> + Send + 'static,
    {
        self.routes.push(Route {
            method: Method::GET,
            path: path.to_string(),
            kind: RouteKind::Bearer(Box::new(move |req, state, identity| {
                Box::pin(handler(req, state, identity))
            })),
        });
        self
    }

    // ── Dispatch ──────────────────────────────────────────────────────────────

    pub async fn route(
        &self,
        req: Request<RequestBody>,
        state: AppState,
    ) -> Result<Response<ResponseBody>> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        for route in &self.routes {
            if route.method != method || !Self::path_matches(&route.path, &path) {
                continue;
            }

            return match &route.kind {
                RouteKind::Open(h) => h(req, state).await,

                RouteKind::Protected(h) => {
                    let gate = state.gate.clone();
                    gate.serve(h, req, state).await
                }

                RouteKind::Bearer(h) => {
                    let verified = get_bearer_token(req.headers())
                        .ok_or_else(|| "missing bearer token".to_string())
                        .and_then(|token| {
                            state.tokens.authenticate(&token).map_err(|e| e.to_string())
                        });
                    match verified {
                        Ok(identity) => h(req, state, identity).await,
                        Err(reason) => {
                            warn!("Bearer auth rejected {} {}: {}", method, path, reason);
                            unauthorized()
                        }
                    }
                }
            };
        }

        // No registered route matched: try static file fallback for GET.
        if method == Method::GET {
            if let Some(static_response) = self.try_serve_static(&path, &state)? {
                return Ok(static_response);
            }
        }

        debug!("No route for {} {}", method, path);
        deliver_error_json("NOT_FOUND", "Endpoint not found", StatusCode::NOT_FOUND)
            .context("Failed to deliver 404 response")
    }

    // ── Path matching ─────────────────────────────────────────────────────────

    pub fn path_matches(route_path: &str, request_path: &str) -> bool {
        // Strip query string from incoming request path before comparing.
        let clean = request_path.split('?').next().unwrap_or(request_path);

        if route_path == clean {
            return true;
        }

        // Segment-by-segment matching for `:param` wildcards.
        let route_segs: Vec<&str> = route_path.split('/').collect();
        let path_segs: Vec<&str> = clean.split('/').collect();

        if route_segs.len() != path_segs.len() {
            return false;
        }

        route_segs
            .iter()
            .zip(path_segs.iter())
            .all(|(r, p)| r.starts_with(':') || r == p)
    }

    // ── Static file fallback ──────────────────────────────────────────────────

    fn try_serve_static(
        &self,
        path: &str,
        state: &AppState,
    ) -> Result<Option<Response<ResponseBody>>> {
        let web_dir = self
            .web_dir
            .as_deref()
            .unwrap_or(&state.config.paths.web_dir)
            .trim_end_matches('/');

        match path {
            path if path.starts_with("/static/") || path == "/favicon.ico" => {
                match resolve_web_path(web_dir, path) {
                    Some(file_path) => Ok(Some(
                        deliver_page_with_status(&file_path, StatusCode::OK, CacheStrategy::Yes)
                            .context("Failed to deliver static file")?,
                    )),
                    None => {
                        warn!("Rejected static path: {}", path);
                        Ok(None)
                    }
                }
            }

            _ => Ok(None),
        }
    }
}

// ---------------------------------------------------------------------------
// Application router
//
// The auth tier is enforced here at the routing level; handlers MUST NOT
// repeat the auth call.
//
//   .get / .post         -> Open       handler gets (req, state)
//   .get_protected(...)  -> Gate       RouteHandler variant decides the args
//   .get_bearer(...)     -> Bearer     handler gets (req, state, identity)
// ---------------------------------------------------------------------------

pub fn build_router() -> Router {
    Router::new()
        // ── Public: no auth ──────────────────────────────────────────────────
        .get("/health", |_req, _state| async move {
            deliver_serialized_json(
                &serde_json::json!({"status": "success", "health": "ok"}),
                StatusCode::OK,
            )
        })
        .get("/login", pages::handle_login_page)
        .post("/login", auth::handle_login)
        .get("/register", pages::handle_register_page)
        .post("/register", auth::handle_register)
        .post("/logout", auth::handle_logout)
        .post("/api/token", auth::handle_token)
        .post("/authn", auth::handle_authn)
        // ── Session: through the auth gate ───────────────────────────────────
        .get_protected("/", RouteHandler::no_arg(pages::handle_index))
        .get_protected(
            "/welcome",
            RouteHandler::with_path_and_session(pages::handle_page),
        )
        .get_protected(
            "/account",
            RouteHandler::with_path_and_session(pages::handle_page),
        )
        .get_protected("/api/me", RouteHandler::with_session(pages::handle_me))
        .get_protected("/admin", RouteHandler::with_session(pages::handle_admin))
        // ── Bearer token ─────────────────────────────────────────────────────
        .get_bearer("/api/whoami", pages::handle_whoami)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
