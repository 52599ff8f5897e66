use std::collections::HashMap;

use anyhow::{Context, Result};
use http::HeaderMap;
use hyper::{Request, Response, StatusCode, header};
use tracing::{error, info, warn};

use sso_shared::types::{LoginData, LoginError, LoginResponse, UserRecord};

use crate::handlers::http::utils::{self, json_response};
use crate::users::{DUMMY_PASSWORD_HASH, verify_password_blocking};
use crate::{AppState, RequestBody, ResponseBody};

/// Where the browser goes after a successful form login.
pub const LOGIN_REDIRECT: &str = "/welcome";

/// Form login: `email` + `password` -> session cookie + JSON success.
pub async fn handle_login(
    req: Request<RequestBody>,
    state: AppState,
) -> Result<Response<ResponseBody>> {
    info!("Processing login request");

    let (parts, body) = req.into_parts();

    let login_data = match parse_login_form(body).await {
        Ok(data) => data,
        Err(login_error) => {
            warn!("Login parsing failed: {}", login_error.to_code());
            return deliver_login_error(&login_error);
        }
    };

    if let Err(login_error) = validate_login(&login_data) {
        warn!("Login validation failed: {}", login_error.to_code());
        return deliver_login_error(&login_error);
    }

    let user = match attempt_login(&login_data, &state).await {
        Ok(user) => user,
        Err(login_error) => {
            warn!("Login failed: {}", login_error.to_code());
            return deliver_login_error(&login_error);
        }
    };

    let mut cookies = HeaderMap::new();
    if let Err(e) = state
        .sessions
        .set(&mut cookies, &parts.headers, &user.identity())
        .await
    {
        error!("Failed to start session for {}: {}", user.id, e);
        return deliver_login_error(&LoginError::SessionError);
    }

    info!("User logged in successfully: {} (ID: {})", user.name, user.id);

    let mut response = json_response::deliver_serialized_json(
        &LoginResponse::Success {
            name: user.name,
            message: "Login successful".to_string(),
            redirect: LOGIN_REDIRECT.to_string(),
        },
        StatusCode::OK,
    )
    .context("Failed to build login response")?;

    for cookie in cookies.get_all(header::SET_COOKIE) {
        response.headers_mut().append(header::SET_COOKIE, cookie.clone());
    }
    Ok(utils::add_no_cache_headers(response))
}

/// Parse an urlencoded login form
async fn parse_login_form(body: RequestBody) -> std::result::Result<LoginData, LoginError> {
    let body = utils::collect_body(body).await.map_err(|e| {
        warn!("Unreadable login form: {}", e);
        LoginError::InternalError
    })?;

    let params = form_urlencoded::parse(body.as_ref())
        .into_owned()
        .collect::<HashMap<String, String>>();

    let email = params
        .get("email")
        .or_else(|| params.get("username"))
        .ok_or(LoginError::MissingField("email".to_string()))?
        .trim()
        .to_string();

    let password = params
        .get("password")
        .ok_or(LoginError::MissingField("password".to_string()))?
        .to_string();

    Ok(LoginData { email, password })
}

/// Validate login data
pub(crate) fn validate_login(data: &LoginData) -> std::result::Result<(), LoginError> {
    if data.email.is_empty() {
        return Err(LoginError::MissingField("email".to_string()));
    }

    if data.password.is_empty() {
        return Err(LoginError::MissingField("password".to_string()));
    }

    Ok(())
}

/// Look the user up and check the password.
///
/// An unknown email and a wrong password are the same error.
pub(crate) async fn attempt_login(
    data: &LoginData,
    state: &AppState,
) -> std::result::Result<UserRecord, LoginError> {
    info!("Attempting login for: {}", data.email);

    let found = state
        .users
        .find_by_email(&data.email)
        .await
        .map_err(|e| {
            error!("User store error: {:#}", e);
            LoginError::UserStoreError
        })?;

    let Some(user) = found else {
        // Same Argon2 cost as a known email with a wrong password.
        if let Err(e) =
            verify_password_blocking(DUMMY_PASSWORD_HASH.to_string(), data.password.clone()).await
        {
            error!("Dummy password verification error: {:#}", e);
        }
        warn!("Unknown email: {}", data.email);
        return Err(LoginError::InvalidCredentials);
    };

    let password_valid =
        verify_password_blocking(user.password_hash.clone(), data.password.clone())
            .await
            .map_err(|e| {
                error!("Password verification error: {:#}", e);
                LoginError::InternalError
            })?;

    if !password_valid {
        warn!("Invalid password for: {}", data.email);
        return Err(LoginError::InvalidCredentials);
    }

    Ok(user)
}

pub(crate) fn login_error_status(err: &LoginError) -> StatusCode {
    match err {
        LoginError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        LoginError::MissingField(_) => StatusCode::BAD_REQUEST,
        LoginError::UserStoreError | LoginError::SessionError | LoginError::InternalError => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn deliver_login_error(err: &LoginError) -> Result<Response<ResponseBody>> {
    json_response::deliver_serialized_json(&err.to_response(), login_error_status(err))
        .context("Failed to deliver login error")
}
