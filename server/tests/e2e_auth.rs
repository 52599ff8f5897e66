//! End-to-end flows through the application router, without a socket.

use std::sync::Arc;

use bytes::Bytes;
use http::header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE};
use http::{HeaderValue, Method, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use serde_json::{Value, json};
use tempfile::TempDir;

use sso_server::auth::{SecretKey, TokenService};
use sso_server::handlers::http::{Router, build_router};
use sso_server::session::{MemorySessionBackend, SessionStore};
use sso_server::users::{MemoryUserStore, UserStore, hash_password};
use sso_server::{AppState, RequestBody, ResponseBody};
use sso_shared::types::{AppConfig, UserRecord};

struct App {
    router: Router,
    state: AppState,
    _web: TempDir,
}

async fn app() -> App {
    let web = tempfile::tempdir().unwrap();
    for (file, body) in [
        ("index.html", "<h1>index</h1>"),
        ("login.html", "<h1>login</h1>"),
        ("register.html", "<h1>register</h1>"),
        ("welcome.html", "<h1>welcome</h1>"),
        ("admin.html", "<h1>admin</h1>"),
    ] {
        std::fs::write(web.path().join(file), body).unwrap();
    }
    std::fs::create_dir(web.path().join("static")).unwrap();
    std::fs::write(web.path().join("static/app.css"), "body{}").unwrap();

    let users = MemoryUserStore::new();
    users
        .insert(UserRecord {
            id: "u1".into(),
            name: "Ann".into(),
            email: "ann@x.com".into(),
            admin: false,
            password_hash: hash_password("correct horse").unwrap(),
            created: 0,
        })
        .await
        .unwrap();
    users
        .insert(UserRecord {
            id: "u2".into(),
            name: "Root".into(),
            email: "root@x.com".into(),
            admin: true,
            password_hash: hash_password("rootpw").unwrap(),
            created: 0,
        })
        .await
        .unwrap();

    let mut config = AppConfig::default();
    config.paths.web_dir = web.path().to_string_lossy().into_owned();

    let state = AppState::new(
        config,
        TokenService::new(SecretKey::from("e2e-token-secret-0123456789abcdef")),
        SessionStore::new(
            Arc::new(MemorySessionBackend::new()),
            SecretKey::from("e2e-session-key-0123456789abcdef"),
        ),
        Arc::new(users),
    );

    App {
        router: build_router(),
        state,
        _web: web,
    }
}

fn body(bytes: impl Into<Bytes>) -> RequestBody {
    Full::new(bytes.into()).map_err(|never| match never {}).boxed()
}

fn request(method: Method, path: &str, payload: &str) -> Request<RequestBody> {
    Request::builder()
        .method(method)
        .uri(path)
        .body(body(payload.to_string()))
        .unwrap()
}

fn with_cookie(mut req: Request<RequestBody>, cookie: &str) -> Request<RequestBody> {
    req.headers_mut()
        .insert(COOKIE, HeaderValue::from_str(cookie).unwrap());
    req
}

impl App {
    async fn send(&self, req: Request<RequestBody>) -> Response<ResponseBody> {
        self.router.route(req, self.state.clone()).await.unwrap()
    }

    async fn login(&self, email: &str, password: &str) -> Response<ResponseBody> {
        let form: String = form_urlencoded::Serializer::new(String::new())
            .append_pair("email", email)
            .append_pair("password", password)
            .finish();
        let mut req = request(Method::POST, "/login", &form);
        req.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        self.send(req).await
    }

    async fn register(&self, fields: &[(&str, &str)]) -> Response<ResponseBody> {
        let form: String = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();
        self.send(request(Method::POST, "/register", &form)).await
    }

    async fn token(&self, email: &str, password: &str) -> String {
        let payload = json!({"email": email, "password": password}).to_string();
        let res = self.send(request(Method::POST, "/api/token", &payload)).await;
        assert_eq!(res.status(), StatusCode::OK);
        json_body(res).await["jwt"].as_str().unwrap().to_string()
    }
}

/// The `name=value` part of the response's session cookie.
fn session_cookie(res: &Response<ResponseBody>) -> String {
    let set = res.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
    set.split(';').next().unwrap().to_string()
}

async fn json_body(res: Response<ResponseBody>) -> Value {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn text_body(res: Response<ResponseBody>) -> String {
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn health_is_open() {
    let app = app().await;
    let res = app.send(request(Method::GET, "/health", "")).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json_body(res).await["health"], "ok");
}

#[tokio::test]
async fn protected_page_without_cookie_redirects_to_login() {
    let app = app().await;
    for path in ["/", "/welcome", "/account", "/api/me", "/admin"] {
        let res = app.send(request(Method::GET, path, "")).await;
        assert_eq!(res.status(), StatusCode::FOUND, "{}", path);
        assert_eq!(res.headers().get(LOCATION).unwrap(), "/login");
    }
}

#[tokio::test]
async fn login_page_is_open() {
    let app = app().await;
    let res = app.send(request(Method::GET, "/login", "")).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(text_body(res).await, "<h1>login</h1>");
}

#[tokio::test]
async fn wrong_password_is_refused_without_cookie() {
    let app = app().await;
    let res = app.login("ann@x.com", "wrong").await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert!(res.headers().get(SET_COOKIE).is_none());

    let body = json_body(res).await;
    assert_eq!(body["code"], "INVALID_CREDENTIALS");
    assert_eq!(body["message"], "Email or password incorrect");

    let res = app.login("nobody@x.com", "wrong").await;
    assert_eq!(json_body(res).await["message"], "Email or password incorrect");
}

#[tokio::test]
async fn missing_field_is_bad_request() {
    let app = app().await;
    let res = app.send(request(Method::POST, "/login", "email=ann%40x.com")).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(res).await["code"], "MISSING_FIELD");
}

#[tokio::test]
async fn login_page_access_logout_cycle() {
    let app = app().await;

    let res = app.login("ann@x.com", "correct horse").await;
    assert_eq!(res.status(), StatusCode::OK);
    let cookie = session_cookie(&res);
    assert!(cookie.starts_with("sso="));
    let body = json_body(res).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["redirect"], "/welcome");

    let res = app
        .send(with_cookie(request(Method::GET, "/welcome", ""), &cookie))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(text_body(res).await, "<h1>welcome</h1>");

    let res = app
        .send(with_cookie(request(Method::GET, "/", ""), &cookie))
        .await;
    assert_eq!(text_body(res).await, "<h1>index</h1>");

    let res = app
        .send(with_cookie(request(Method::GET, "/api/me", ""), &cookie))
        .await;
    assert_eq!(
        json_body(res).await,
        json!({"id": "u1", "name": "Ann", "email": "ann@x.com", "admin": false})
    );

    let res = app
        .send(with_cookie(request(Method::POST, "/logout", ""), &cookie))
        .await;
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(res.headers().get(LOCATION).unwrap(), "/login");
    let expired = res.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
    assert!(expired.contains("Max-Age=0"));

    // replaying the old cookie no longer works
    let res = app
        .send(with_cookie(request(Method::GET, "/welcome", ""), &cookie))
        .await;
    assert_eq!(res.status(), StatusCode::FOUND);
}

#[tokio::test]
async fn protected_page_that_does_not_exist_is_404() {
    let app = app().await;
    let cookie = session_cookie(&app.login("ann@x.com", "correct horse").await);
    let res = app
        .send(with_cookie(request(Method::GET, "/account", ""), &cookie))
        .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_page_requires_admin() {
    let app = app().await;

    let ann = session_cookie(&app.login("ann@x.com", "correct horse").await);
    let res = app
        .send(with_cookie(request(Method::GET, "/admin", ""), &ann))
        .await;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let root = session_cookie(&app.login("root@x.com", "rootpw").await);
    let res = app
        .send(with_cookie(request(Method::GET, "/admin", ""), &root))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(text_body(res).await, "<h1>admin</h1>");
}

#[tokio::test]
async fn forged_cookie_redirects() {
    let app = app().await;
    let cookie = session_cookie(&app.login("ann@x.com", "correct horse").await);
    let (sid, _sig) = cookie.rsplit_once('.').unwrap();
    let forged = format!("{}.AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA", sid);

    let res = app
        .send(with_cookie(request(Method::GET, "/welcome", ""), &forged))
        .await;
    assert_eq!(res.status(), StatusCode::FOUND);
}

#[tokio::test]
async fn token_then_authn_round_trip() {
    let app = app().await;
    let jwt = app.token("ann@x.com", "correct horse").await;
    assert_eq!(jwt.split('.').count(), 3);

    let payload = json!({ "jwt": jwt }).to_string();
    let res = app.send(request(Method::POST, "/authn", &payload)).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        json_body(res).await,
        json!({"name": "Ann", "email": "ann@x.com", "admin": false})
    );
}

#[tokio::test]
async fn token_with_bad_credentials_is_refused() {
    let app = app().await;
    let payload = json!({"email": "ann@x.com", "password": "nope"}).to_string();
    let res = app.send(request(Method::POST, "/api/token", &payload)).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(res).await["code"], "INVALID_CREDENTIALS");

    let res = app.send(request(Method::POST, "/api/token", "not json")).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn tampered_token_is_forbidden_at_authn() {
    let app = app().await;
    let jwt = app.token("ann@x.com", "correct horse").await;
    // swap in a payload claiming admin, keep the old signature
    let forged_payload = sso_server::auth::codec::encode(
        br#"{"jti":"x","iat":0,"name":"Ann","email":"ann@x.com","admin":true}"#,
    );
    let mut parts: Vec<&str> = jwt.split('.').collect();
    parts[1] = &forged_payload;
    let forged = parts.join(".");

    for token in [forged.as_str(), "a.b", "", "a.b.c.d"] {
        let payload = json!({ "jwt": token }).to_string();
        let res = app.send(request(Method::POST, "/authn", &payload)).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN, "{}", token);
        assert_eq!(json_body(res).await["message"], "Invalid token");
    }
}

#[tokio::test]
async fn whoami_requires_bearer_token() {
    let app = app().await;

    let res = app.send(request(Method::GET, "/api/whoami", "")).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert!(res.headers().get(LOCATION).is_none());

    let jwt = app.token("root@x.com", "rootpw").await;
    let mut req = request(Method::GET, "/api/whoami", "");
    req.headers_mut().insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", jwt)).unwrap(),
    );
    let res = app.send(req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body = json_body(res).await;
    assert_eq!(body["name"], "Root");
    assert_eq!(body["admin"], true);
}

#[tokio::test]
async fn session_cookie_is_not_a_bearer_token() {
    let app = app().await;
    let cookie = session_cookie(&app.login("ann@x.com", "correct horse").await);
    let res = app
        .send(with_cookie(request(Method::GET, "/api/whoami", ""), &cookie))
        .await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn static_files_and_unknown_paths() {
    let app = app().await;

    let res = app.send(request(Method::GET, "/static/app.css", "")).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers().get(CONTENT_TYPE).unwrap(),
        "text/css; charset=utf-8"
    );

    let res = app
        .send(request(Method::GET, "/static/../login.html", ""))
        .await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = app.send(request(Method::GET, "/nope", "")).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn register_page_is_open() {
    let app = app().await;
    let res = app.send(request(Method::GET, "/register", "")).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(text_body(res).await, "<h1>register</h1>");
}

#[tokio::test]
async fn registered_user_can_log_in() {
    let app = app().await;
    let res = app
        .register(&[
            ("name", "Cy"),
            ("email", "cy@x.com"),
            ("password", "tr0ub4dor"),
            ("password_confirm", "tr0ub4dor"),
        ])
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    assert!(res.headers().get(SET_COOKIE).is_none());
    let body = json_body(res).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["name"], "Cy");
    assert_eq!(body["redirect"], "/login");
    let id = body["id"].as_str().unwrap().to_string();

    let stored = app.state.users.find_by_email("cy@x.com").await.unwrap().unwrap();
    assert_eq!(stored.id, id);
    assert!(!stored.admin);
    assert!(stored.password_hash.starts_with("$argon2id$"));
    assert!(stored.created > 0);

    let res = app.login("cy@x.com", "tr0ub4dor").await;
    assert_eq!(res.status(), StatusCode::OK);
    let cookie = session_cookie(&res);
    let res = app
        .send(with_cookie(request(Method::GET, "/api/me", ""), &cookie))
        .await;
    assert_eq!(
        json_body(res).await,
        json!({"id": id, "name": "Cy", "email": "cy@x.com", "admin": false})
    );
}

#[tokio::test]
async fn register_with_taken_email_conflicts() {
    let app = app().await;
    let res = app
        .register(&[
            ("name", "Imposter"),
            ("email", "ann@x.com"),
            ("password", "tr0ub4dor"),
        ])
        .await;
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body = json_body(res).await;
    assert_eq!(body["code"], "EMAIL_TAKEN");
    assert_eq!(body["message"], "Email address already taken");

    // the original account is untouched
    let res = app.login("ann@x.com", "correct horse").await;
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn register_missing_fields_are_bad_requests() {
    let app = app().await;
    for (fields, missing) in [
        (vec![("email", "cy@x.com"), ("password", "tr0ub4dor")], "name"),
        (vec![("name", "Cy"), ("password", "tr0ub4dor")], "email"),
        (vec![("name", "Cy"), ("email", "cy@x.com")], "password"),
        (
            vec![("name", "Cy"), ("email", "cy@x.com"), ("password", "")],
            "password",
        ),
    ] {
        let res = app.register(&fields).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{}", missing);
        let body = json_body(res).await;
        assert_eq!(body["code"], "MISSING_FIELD");
        assert_eq!(
            body["message"],
            format!("Missing required field: {}", missing)
        );
    }
    assert!(app.state.users.find_by_email("cy@x.com").await.unwrap().is_none());
}

#[tokio::test]
async fn register_rejects_weak_password_and_bad_email() {
    let app = app().await;
    let res = app
        .register(&[("name", "Cy"), ("email", "cy@x.com"), ("password", "short")])
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(res).await["code"], "INVALID_PASSWORD");

    let res = app
        .register(&[("name", "Cy"), ("email", "cy-at-x"), ("password", "tr0ub4dor")])
        .await;
    assert_eq!(json_body(res).await["code"], "INVALID_EMAIL");
}

#[tokio::test]
async fn lowercase_bearer_scheme_is_accepted() {
    let app = app().await;
    let jwt = app.token("ann@x.com", "correct horse").await;
    let mut req = request(Method::GET, "/api/whoami", "");
    req.headers_mut().insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("bearer {}", jwt)).unwrap(),
    );
    let res = app.send(req).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json_body(res).await["name"], "Ann");
}
