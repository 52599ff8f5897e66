use anyhow::Result;
use hyper::{Request, Response, StatusCode};
use tracing::{error, info};

use crate::handlers::http::utils::{self, json_response};
use crate::{AppState, RequestBody, ResponseBody};

/// End the session (if any), expire the cookie and send the browser back to
/// the login page. Safe to call without a session.
pub async fn handle_logout(
    req: Request<RequestBody>,
    state: AppState,
) -> Result<Response<ResponseBody>> {
    let mut response =
        utils::deliver_redirect(state.gate.login_path(), StatusCode::SEE_OTHER)?;

    if let Err(e) = state
        .sessions
        .end(response.headers_mut(), req.headers())
        .await
    {
        error!("Failed to end session: {}", e);
        return json_response::internal_error();
    }

    info!("User logged out");
    Ok(utils::add_no_cache_headers(response))
}
