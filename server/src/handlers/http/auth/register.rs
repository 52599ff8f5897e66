use std::collections::HashMap;

use anyhow::{Context, Result};
use hyper::{Request, Response, StatusCode};
use tracing::{error, info, warn};
use uuid::Uuid;

use sso_shared::types::{RegisterData, RegisterError, RegisterResponse, UserRecord};

use crate::auth::token::unix_now;
use crate::handlers::http::utils::{self, json_response};
use crate::users::{EmailTaken, hash_password_blocking};
use crate::{AppState, RequestBody, ResponseBody};

/// Where the browser goes after registering.
pub const REGISTER_REDIRECT: &str = "/login";

/// Form registration: `name` + `email` + `password` -> new user, 201 JSON.
///
/// Does not sign the user in.
pub async fn handle_register(
    req: Request<RequestBody>,
    state: AppState,
) -> Result<Response<ResponseBody>> {
    info!("Processing registration request");

    let data = match parse_register_form(req.into_body()).await {
        Ok(data) => data,
        Err(register_error) => {
            warn!("Registration parsing failed: {}", register_error.to_code());
            return deliver_register_error(&register_error);
        }
    };

    if let Err(register_error) = validate_registration(&data) {
        warn!("Registration validation failed: {}", register_error.to_code());
        return deliver_register_error(&register_error);
    }

    let user = match attempt_registration(data, &state).await {
        Ok(user) => user,
        Err(register_error) => {
            warn!("Registration failed: {}", register_error.to_code());
            return deliver_register_error(&register_error);
        }
    };

    info!("User registered: {} (ID: {})", user.name, user.id);

    json_response::deliver_serialized_json(
        &RegisterResponse::Success {
            id: user.id,
            name: user.name,
            message: "Registration successful".to_string(),
            redirect: REGISTER_REDIRECT.to_string(),
        },
        StatusCode::CREATED,
    )
    .context("Failed to build registration response")
}

/// Parse an urlencoded registration form
async fn parse_register_form(
    body: RequestBody,
) -> std::result::Result<RegisterData, RegisterError> {
    let body = utils::collect_body(body).await.map_err(|e| {
        warn!("Unreadable registration form: {}", e);
        RegisterError::InternalError
    })?;

    let params = form_urlencoded::parse(body.as_ref())
        .into_owned()
        .collect::<HashMap<String, String>>();

    let field = |name: &str| {
        params
            .get(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| RegisterError::MissingField(name.to_string()))
    };

    let name = field("name")?;
    let email = field("email")?;
    let password = params
        .get("password")
        .filter(|p| !p.is_empty())
        .cloned()
        .ok_or_else(|| RegisterError::MissingField("password".to_string()))?;

    Ok(RegisterData {
        name,
        email,
        password,
        password_confirm: params.get("password_confirm").cloned(),
    })
}

fn validate_registration(data: &RegisterData) -> std::result::Result<(), RegisterError> {
    if data.name.chars().count() > 64 || data.name.chars().any(char::is_control) {
        return Err(RegisterError::InvalidName);
    }

    if !is_valid_email(&data.email) {
        return Err(RegisterError::InvalidEmail);
    }

    validate_password(&data.password)?;

    if let Some(confirm) = &data.password_confirm {
        if *confirm != data.password {
            return Err(RegisterError::PasswordMismatch);
        }
    }

    Ok(())
}

fn validate_password(password: &str) -> std::result::Result<(), RegisterError> {
    if password.len() < 8 || password.len() > 128 {
        return Err(RegisterError::InvalidPassword);
    }
    if !password.chars().any(|c| c.is_numeric()) {
        return Err(RegisterError::InvalidPassword);
    }
    if !password.chars().any(|c| c.is_alphabetic()) {
        return Err(RegisterError::InvalidPassword);
    }
    Ok(())
}

/// Basic email validation
fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') || email.chars().any(char::is_whitespace) {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|l| !l.is_empty())
}

/// Check the email is free, hash the password and store the user.
async fn attempt_registration(
    data: RegisterData,
    state: &AppState,
) -> std::result::Result<UserRecord, RegisterError> {
    info!("Attempting registration for: {}", data.email);

    let existing = state.users.find_by_email(&data.email).await.map_err(|e| {
        error!("User store error: {:#}", e);
        RegisterError::UserStoreError
    })?;
    if existing.is_some() {
        warn!("Email already registered: {}", data.email);
        return Err(RegisterError::EmailTaken);
    }

    let password_hash = hash_password_blocking(data.password).await.map_err(|e| {
        error!("Password hashing error: {:#}", e);
        RegisterError::InternalError
    })?;

    let user = UserRecord {
        id: Uuid::new_v4().to_string(),
        name: data.name,
        email: data.email,
        admin: false,
        password_hash,
        created: unix_now(),
    };

    match state.users.insert(user.clone()).await {
        Ok(()) => Ok(user),
        // lost a race with a concurrent registration
        Err(e) if e.downcast_ref::<EmailTaken>().is_some() => {
            warn!("{}", e);
            Err(RegisterError::EmailTaken)
        }
        Err(e) => {
            error!("Failed to store new user: {:#}", e);
            Err(RegisterError::UserStoreError)
        }
    }
}

fn register_error_status(err: &RegisterError) -> StatusCode {
    match err {
        RegisterError::MissingField(_)
        | RegisterError::InvalidName
        | RegisterError::InvalidEmail
        | RegisterError::InvalidPassword
        | RegisterError::PasswordMismatch => StatusCode::BAD_REQUEST,
        RegisterError::EmailTaken => StatusCode::CONFLICT,
        RegisterError::UserStoreError | RegisterError::InternalError => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn deliver_register_error(err: &RegisterError) -> Result<Response<ResponseBody>> {
    json_response::deliver_serialized_json(&err.to_response(), register_error_status(err))
        .context("Failed to deliver registration error")
}
