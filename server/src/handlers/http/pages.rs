use anyhow::{Context, Result};
use hyper::{Request, Response, StatusCode};
use tracing::{debug, info, warn};

use sso_shared::types::Identity;

use crate::handlers::http::utils::{self, json_response};
use crate::{AppState, RequestBody, ResponseBody};

fn web_page(state: &AppState, page: &str) -> Result<Response<ResponseBody>> {
    match utils::resolve_web_path(&state.config.paths.web_dir, &format!("{}.html", page)) {
        Some(path) => utils::deliver_html_page(&path)
            .with_context(|| format!("Failed to deliver page {}", page)),
        None => json_response::deliver_error_json(
            "NOT_FOUND",
            "Page not found",
            StatusCode::NOT_FOUND,
        ),
    }
}

pub async fn handle_login_page(
    _req: Request<RequestBody>,
    state: AppState,
) -> Result<Response<ResponseBody>> {
    web_page(&state, "login")
}

pub async fn handle_register_page(
    _req: Request<RequestBody>,
    state: AppState,
) -> Result<Response<ResponseBody>> {
    web_page(&state, "register")
}

/// `/`: needs a session but nothing from it.
pub async fn handle_index(state: AppState) -> Result<Response<ResponseBody>> {
    web_page(&state, "index")
}

/// Any named page behind the gate.
pub async fn handle_page(
    page: String,
    state: AppState,
    identity: Identity,
) -> Result<Response<ResponseBody>> {
    debug!("Serving page {} to {}", page, identity.name);
    web_page(&state, &page)
}

/// The signed-in user. Sessions do not carry the email, so it is filled in
/// from the user store when the user still exists.
pub async fn handle_me(
    _req: Request<RequestBody>,
    state: AppState,
    mut identity: Identity,
) -> Result<Response<ResponseBody>> {
    if let Some(id) = identity.id.as_deref() {
        match state.users.find_by_id(id).await {
            Ok(Some(user)) => identity.email = Some(user.email),
            Ok(None) => debug!("Session user {} is not in the user store", id),
            Err(e) => warn!("User lookup for /api/me failed: {:#}", e),
        }
    }

    let response = json_response::deliver_serialized_json(&identity, StatusCode::OK)
        .context("Failed to deliver identity")?;
    Ok(utils::add_no_cache_headers(response))
}

pub async fn handle_admin(
    _req: Request<RequestBody>,
    state: AppState,
    identity: Identity,
) -> Result<Response<ResponseBody>> {
    if !identity.is_admin {
        warn!("Non-admin {} refused at /admin", identity.name);
        return json_response::forbidden();
    }
    info!("Admin page served to {}", identity.name);
    web_page(&state, "admin")
}

/// Bearer-authenticated counterpart of `/api/me`.
pub async fn handle_whoami(
    _req: Request<RequestBody>,
    _state: AppState,
    identity: Identity,
) -> Result<Response<ResponseBody>> {
    json_response::deliver_serialized_json(&identity, StatusCode::OK)
        .context("Failed to deliver identity")
}
