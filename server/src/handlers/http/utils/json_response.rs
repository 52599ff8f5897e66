use anyhow::{Context, Result, anyhow};
use hyper::{Response, StatusCode, header};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, error, warn};

use sso_shared::types::ErrorResponse;

use crate::ResponseBody;
use crate::handlers::http::utils::deliver_page::full;

/// Serialize any `Serialize` type and deliver it as a JSON response.
/// This is the primary helper all handlers should use instead of
/// writing their own one-off serialization + response-building blocks.
pub fn deliver_serialized_json<T: Serialize>(
    data: &T,
    status: StatusCode,
) -> Result<Response<ResponseBody>> {
    let json = serde_json::to_string(data).context("Failed to serialize response")?;

    debug!("Delivering serialized JSON response, size: {} bytes", json.len());

    let response = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(full(json))
        .map_err(|e| anyhow!("Failed to build JSON response: {}", e))?;

    Ok(response)
}

/// Delivers a JSON error response with the specified error code, message, and status.
///
/// `message` goes to the client verbatim, so it must never carry internal
/// error text.
pub fn deliver_error_json(
    error_code: &str,
    message: &str,
    status: StatusCode,
) -> Result<Response<ResponseBody>> {
    if status.is_server_error() {
        error!("Delivering error JSON: {} - {}", status.as_u16(), error_code);
    } else {
        warn!("Delivering error JSON: {} - {}", status.as_u16(), error_code);
    }

    deliver_serialized_json(&ErrorResponse::new(error_code, message), status)
}

/// Delivers a success JSON response with optional data.
pub fn deliver_success_json<T: Serialize>(data: Option<T>) -> Result<Response<ResponseBody>> {
    let response_body = match data {
        Some(d) => json!({
            "status": "success",
            "data": d
        }),
        None => json!({
            "status": "success"
        }),
    };

    deliver_serialized_json(&response_body, StatusCode::OK)
}

/// 401 for bearer-protected endpoints.
pub fn unauthorized() -> Result<Response<ResponseBody>> {
    deliver_error_json(
        "UNAUTHORIZED",
        "Authentication required",
        StatusCode::UNAUTHORIZED,
    )
    .context("Failed to deliver 401 response")
}

pub fn forbidden() -> Result<Response<ResponseBody>> {
    deliver_error_json(
        "FORBIDDEN",
        "Insufficient privileges",
        StatusCode::FORBIDDEN,
    )
    .context("Failed to deliver 403 response")
}

pub fn internal_error() -> Result<Response<ResponseBody>> {
    deliver_error_json(
        "INTERNAL_ERROR",
        "An internal error occurred",
        StatusCode::INTERNAL_SERVER_ERROR,
    )
    .context("Failed to deliver 500 response")
}
