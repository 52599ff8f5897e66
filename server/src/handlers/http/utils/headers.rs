use anyhow::{Result, anyhow};
use hyper::header::{HeaderMap, HeaderValue};
use std::time::Duration;
use tracing::{debug, warn};

/// Extract a header value as a string
pub fn get_header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(|s| {
        debug!("Retrieved header: {}", name);
        s.to_string()
    })
}

/// Extract cookie value by name.
///
/// Looks through every `Cookie` header, since HTTP/2 clients may split them.
pub fn get_cookie(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    headers
        .get_all("cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .find_map(|cookie| {
            let (name, value) = cookie.trim().split_once('=')?;
            if name.trim() == cookie_name {
                debug!("Cookie found: {}", cookie_name);
                Some(value.trim().to_string())
            } else {
                None
            }
        })
        .or_else(|| {
            debug!("Cookie not found: {}", cookie_name);
            None
        })
}

/// Set a cookie with options
pub fn set_cookie(
    name: &str,
    value: &str,
    max_age: Option<Duration>,
    path: Option<&str>,
    http_only: bool,
    secure: bool,
) -> Result<HeaderValue> {
    let mut cookie = format!("{}={}", name, value);

    if let Some(age) = max_age {
        cookie.push_str(&format!("; Max-Age={}", age.as_secs()));
    }

    if let Some(p) = path {
        cookie.push_str(&format!("; Path={}", p));
    }

    if http_only {
        cookie.push_str("; HttpOnly");
    }

    if secure {
        cookie.push_str("; Secure");
    }

    cookie.push_str("; SameSite=Lax");

    debug!("Setting cookie: {}", name);

    HeaderValue::from_str(&cookie).map_err(|e| {
        warn!("Failed to create cookie header for {}: {}", name, e);
        anyhow!("Invalid cookie value: {}", e)
    })
}

/// Create a persistent cookie with expiration
pub fn create_persistent_cookie(
    name: &str,
    value: &str,
    max_age: Duration,
    secure: bool,
) -> Result<HeaderValue> {
    debug!(
        "Creating persistent cookie: {} with max_age: {:?}",
        name, max_age
    );
    set_cookie(name, value, Some(max_age), Some("/"), true, secure)
}

/// Delete a cookie by setting it to expire
pub fn delete_cookie(name: &str, secure: bool) -> Result<HeaderValue> {
    debug!("Deleting cookie: {}", name);
    set_cookie(
        name,
        "",
        Some(Duration::from_secs(0)),
        Some("/"),
        true,
        secure,
    )
}

/// Extract bearer token from Authorization header
/// Format: "Authorization: Bearer <token>", scheme matched case-insensitively
pub fn get_bearer_token(headers: &HeaderMap) -> Option<String> {
    get_header_value(headers, "authorization").and_then(|auth| {
        let token = auth
            .split_once(' ')
            .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
            .map(|(_, token)| token);
        match token {
            Some(token) if !token.trim().is_empty() => {
                debug!("Bearer token extracted");
                Some(token.trim().to_string())
            }
            _ => {
                warn!("Invalid or missing Bearer token");
                None
            }
        }
    })
}

/// Add no-cache headers so authenticated pages are never stored by proxies
pub fn add_no_cache_headers<T>(mut res: hyper::Response<T>) -> hyper::Response<T> {
    let headers = res.headers_mut();

    headers.insert(
        "cache-control",
        HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );
    headers.insert("pragma", HeaderValue::from_static("no-cache"));
    headers.insert("expires", HeaderValue::from_static("0"));
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );

    debug!("Added no-cache headers");
    res
}

/// Add cache headers with the given max-age (default one year)
pub fn add_cache_headers_with_max_age<T>(
    mut res: hyper::Response<T>,
    max_age_seconds: Option<u64>,
) -> hyper::Response<T> {
    let headers = res.headers_mut();
    let time = max_age_seconds.unwrap_or(31536000);

    let cache_control = format!("public, max-age={}", time);
    headers.insert(
        "cache-control",
        HeaderValue::from_str(&cache_control)
            .unwrap_or_else(|_| HeaderValue::from_static("public, max-age=3600")),
    );
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );

    debug!("Added cache headers with max-age: {} seconds", time);
    res
}
