use anyhow::{Context, Result};
use hyper::{Request, Response, StatusCode};
use tracing::{error, info, warn};

use sso_shared::types::{AuthnRequest, ErrorResponse, LoginData, TokenResponse};

use super::login::{attempt_login, login_error_status, validate_login};
use crate::handlers::http::utils::{self, json_response};
use crate::{AppState, RequestBody, ResponseBody};

/// API login: JSON `{"email","password"}` -> `{"jwt": token}`.
pub async fn handle_token(
    req: Request<RequestBody>,
    state: AppState,
) -> Result<Response<ResponseBody>> {
    let body = match utils::collect_body(req.into_body()).await {
        Ok(body) => body,
        Err(e) => {
            warn!("Unreadable token request: {}", e);
            return bad_json();
        }
    };

    let login_data: LoginData = match serde_json::from_slice(&body) {
        Ok(data) => data,
        Err(e) => {
            warn!("Invalid token request JSON: {}", e);
            return bad_json();
        }
    };

    let user = match validate_login(&login_data) {
        Ok(()) => attempt_login(&login_data, &state).await,
        Err(e) => Err(e),
    };
    let user = match user {
        Ok(user) => user,
        Err(login_error) => {
            warn!("Token request refused: {}", login_error.to_code());
            return json_response::deliver_serialized_json(
                &ErrorResponse::from(&login_error),
                login_error_status(&login_error),
            );
        }
    };

    let jwt = match state.tokens.create(&user.identity()) {
        Ok(jwt) => jwt,
        Err(e) => {
            error!("Failed to issue token for {}: {}", user.id, e);
            return json_response::internal_error();
        }
    };

    info!("Issued token for {} (ID: {})", user.name, user.id);
    json_response::deliver_serialized_json(&TokenResponse { jwt }, StatusCode::OK)
        .context("Failed to deliver token")
}

/// Token check for other services: `{"jwt": token}` -> identity JSON, or
/// 403 when the token does not verify.
pub async fn handle_authn(
    req: Request<RequestBody>,
    state: AppState,
) -> Result<Response<ResponseBody>> {
    let body = match utils::collect_body(req.into_body()).await {
        Ok(body) => body,
        Err(e) => {
            warn!("Unreadable authn request: {}", e);
            return bad_json();
        }
    };

    let request: AuthnRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!("Invalid authn request JSON: {}", e);
            return bad_json();
        }
    };

    match state.tokens.authenticate(&request.jwt) {
        Ok(identity) => json_response::deliver_serialized_json(&identity, StatusCode::OK)
            .context("Failed to deliver identity"),
        Err(e) => {
            warn!("Token rejected at /authn: {}", e);
            json_response::deliver_error_json(e.to_code(), "Invalid token", StatusCode::FORBIDDEN)
        }
    }
}

fn bad_json() -> Result<Response<ResponseBody>> {
    json_response::deliver_error_json(
        "INVALID_JSON",
        "Request body must be valid JSON",
        StatusCode::BAD_REQUEST,
    )
}
