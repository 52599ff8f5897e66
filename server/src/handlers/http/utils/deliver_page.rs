use std::fmt;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use bytes::Bytes;
use http_body_util::{BodyExt, Empty, Full};
use hyper::{Response, StatusCode, header};
use tracing::{debug, error, info};

use crate::ResponseBody;
use crate::handlers::http::utils::{headers, json_response};

#[derive(Debug, Clone, Copy)]
pub enum CacheStrategy {
    Yes,      // Default (1 year)
    Explicit, // No cache at all
}

impl fmt::Display for CacheStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheStrategy::Yes => write!(f, "Yes (1 year)"),
            CacheStrategy::Explicit => write!(f, "Explicit (no-cache)"),
        }
    }
}

/// Join a request path onto `web_dir`, refusing anything that could climb
/// out of it (`..`, absolute components, backslashes).
pub fn resolve_web_path(web_dir: &str, request_path: &str) -> Option<PathBuf> {
    let relative = request_path.trim_start_matches('/');
    if relative.contains('\\') {
        return None;
    }

    let relative = Path::new(relative);
    if !relative
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
    {
        return None;
    }

    Some(Path::new(web_dir).join(relative))
}

/// Read an HTML file from disk and deliver it with no-cache headers.
/// Pages behind the gate must never be cached by intermediaries.
pub fn deliver_html_page<P: AsRef<Path>>(file_path: P) -> Result<Response<ResponseBody>> {
    deliver_page_with_status(file_path, StatusCode::OK, CacheStrategy::Explicit)
}

/// Deliver a page from a file path with caching headers.
///
/// A missing file answers 404 JSON; any other read failure is an error.
pub fn deliver_page_with_status<P: AsRef<Path>>(
    file_path: P,
    status: StatusCode,
    cache: CacheStrategy,
) -> Result<Response<ResponseBody>> {
    let path = file_path.as_ref();

    debug!(
        "Reading static file from: {} (cache: {})",
        path.display(),
        cache
    );

    let content: Vec<u8> = match std::fs::read(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("Static file not found: {}", path.display());
            return json_response::deliver_error_json(
                "NOT_FOUND",
                "Page not found",
                StatusCode::NOT_FOUND,
            );
        }
        Err(e) => {
            return Err(e)
                .with_context(|| format!("Failed to read static file: {}", path.display()));
        }
    };

    let content_bytes: Bytes = Bytes::from(content);
    let mime_type: &str = get_mime_type(path);

    debug!(
        "Delivering static page with status: {}, size: {} bytes, mime: {}",
        status,
        content_bytes.len(),
        mime_type
    );

    let response: Response<ResponseBody> = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, mime_type)
        .body(full(content_bytes))
        .map_err(|e| anyhow!("Failed to build response: {}", e))?;

    let response_with_cache = match cache {
        CacheStrategy::Yes => headers::add_cache_headers_with_max_age(response, None),
        CacheStrategy::Explicit => headers::add_no_cache_headers(response),
    };
    Ok(response_with_cache)
}

/// Helper function to determine MIME type from file extension
fn get_mime_type(path: &Path) -> &'static str {
    match path.extension().and_then(|s| s.to_str()) {
        // Web documents
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js") | Some("mjs") => "application/javascript; charset=utf-8",
        Some("json") => "application/json",

        // Images
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        Some("webp") => "image/webp",

        // Fonts
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",

        Some("txt") => "text/plain; charset=utf-8",

        _ => "application/octet-stream",
    }
}

/// Delivers a redirect with the given status (302 from the gate, 303 after
/// a form POST).
pub fn deliver_redirect(location: &str, status: StatusCode) -> Result<Response<ResponseBody>> {
    info!("Delivering {} redirect to: {}", status.as_u16(), location);

    Response::builder()
        .status(status)
        .header(header::LOCATION, location)
        .body(empty())
        .map_err(|e: http::Error| {
            error!("Failed to build redirect response to {}: {}", location, e);
            anyhow!("Failed to build redirect response: {}", e)
        })
}

/// Helper function to create an empty body
pub fn empty() -> ResponseBody {
    Empty::<Bytes>::new().boxed()
}

/// Helper function to create a full body from various types
pub fn full<T: Into<Bytes>>(chunk: T) -> ResponseBody {
    let bytes: Bytes = chunk.into();
    let full_body: Full<Bytes> = Full::new(bytes);
    full_body.boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn web_path_joins_normal_segments() {
        assert_eq!(
            resolve_web_path("web", "/static/app.css"),
            Some(PathBuf::from("web/static/app.css"))
        );
    }

    #[test]
    fn web_path_rejects_traversal() {
        assert_eq!(resolve_web_path("web", "/static/../../etc/passwd"), None);
        assert_eq!(resolve_web_path("web", "/./secret"), None);
        assert_eq!(resolve_web_path("web", "/static\\..\\x"), None);
    }

    #[test]
    fn mime_types_by_extension() {
        assert_eq!(get_mime_type(Path::new("a.html")), "text/html; charset=utf-8");
        assert_eq!(get_mime_type(Path::new("a.css")), "text/css; charset=utf-8");
        assert_eq!(get_mime_type(Path::new("a")), "application/octet-stream");
    }

    #[test]
    fn html_page_is_served_without_cache() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("index.html");
        std::fs::write(&file, "<h1>hi</h1>").unwrap();

        let res = deliver_html_page(&file).unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            res.headers().get(header::CACHE_CONTROL).unwrap(),
            "no-cache, no-store, must-revalidate"
        );
    }

    #[test]
    fn static_asset_is_cached_for_a_year() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("style.css");
        std::fs::write(&file, "body {}").unwrap();

        let res = deliver_page_with_status(&file, StatusCode::OK, CacheStrategy::Yes).unwrap();
        assert_eq!(
            res.headers().get(header::CACHE_CONTROL).unwrap(),
            "public, max-age=31536000"
        );
    }

    #[test]
    fn missing_page_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let res = deliver_html_page(dir.path().join("nope.html")).unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn redirect_sets_location() {
        let res = deliver_redirect("/login", StatusCode::FOUND).unwrap();
        assert_eq!(res.status(), StatusCode::FOUND);
        assert_eq!(res.headers().get(header::LOCATION).unwrap(), "/login");
    }
}
