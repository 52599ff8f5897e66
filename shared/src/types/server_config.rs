use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

/// Minimum length, in bytes, of the token secret and the session key.
pub const MIN_SECRET_LEN: usize = 32;

/// Upper bound on `session.max_age_days` (ten years).
pub const MAX_SESSION_AGE_DAYS: u64 = 3650;

/// Upper bound on `auth.token_max_age_minutes` (ten years).
pub const MAX_TOKEN_AGE_MINUTES: u64 = MAX_SESSION_AGE_DAYS * 24 * 60;

// ---------------------------------------------------------------------------
// Config structs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PathsConfig {
    #[serde(default = "default_web_dir")]
    pub web_dir: String,
    #[serde(default = "default_users_file")]
    pub users_file: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AuthConfig {
    /// HMAC key used to sign and verify bearer tokens.
    ///
    /// Prefer loading this via the `SSO_SECRET` environment variable. This
    /// field is the fallback for deployments that cannot inject env vars.
    ///
    /// **Minimum length:** 32 characters. Read once at startup; rotating it
    /// invalidates every token issued so far.
    pub token_secret: Option<String>,

    /// Reject tokens whose `iat` is older than this many minutes.
    /// Absent means tokens stay valid for as long as the secret does.
    #[serde(default)]
    pub token_max_age_minutes: Option<u64>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionBackendKind {
    File,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// HMAC key for the session cookie. `SSO_SESSION_KEY` takes priority.
    pub session_key: Option<String>,

    #[serde(default = "default_session_max_age_days")]
    pub max_age_days: u64,

    #[serde(default = "default_session_backend")]
    pub backend: SessionBackendKind,

    #[serde(default = "default_session_dir")]
    pub store_dir: String,

    /// Adds the `Secure` attribute to the session cookie.
    #[serde(default)]
    pub secure_cookie: bool,

    #[serde(default = "default_login_path")]
    pub login_path: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

impl ServerConfig {
    /// Full bind address, e.g. `"127.0.0.1:8080"`
    pub fn addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

impl AuthConfig {
    /// Resolve the token secret with the `SSO_SECRET` env var taking priority
    /// over the config file field.
    pub fn resolved_token_secret(&self) -> Option<String> {
        resolve_secret("SSO_SECRET", self.token_secret.as_ref())
    }

    pub fn token_max_age_secs(&self) -> Option<u64> {
        self.token_max_age_minutes.map(|m| m.saturating_mul(60))
    }
}

impl SessionConfig {
    /// Resolve the session cookie key, `SSO_SESSION_KEY` first.
    pub fn resolved_session_key(&self) -> Option<String> {
        resolve_secret("SSO_SESSION_KEY", self.session_key.as_ref())
    }

    /// Session lifetime in seconds, used for both the cookie `Max-Age` and
    /// the record's `expires_at`.
    pub fn max_age_secs(&self) -> u64 {
        self.max_age_days.saturating_mul(24 * 60 * 60)
    }

    pub fn store_path(&self) -> PathBuf {
        PathBuf::from(&self.store_dir)
    }
}

fn resolve_secret(env_var: &str, configured: Option<&String>) -> Option<String> {
    std::env::var(env_var)
        .ok()
        .filter(|s| !s.is_empty())
        .or_else(|| configured.cloned())
        .filter(|s| !s.is_empty())
}

// ---------------------------------------------------------------------------
// Serde defaults
// ---------------------------------------------------------------------------

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            web_dir: default_web_dir(),
            users_file: default_users_file(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            session_key: None,
            max_age_days: default_session_max_age_days(),
            backend: default_session_backend(),
            store_dir: default_session_dir(),
            secure_cookie: false,
            login_path: default_login_path(),
        }
    }
}

pub fn default_bind() -> String {
    "127.0.0.1".to_string()
}

pub fn default_port() -> u16 {
    8080
}

pub fn default_web_dir() -> String {
    "web".to_string()
}

pub fn default_users_file() -> String {
    "users.json".to_string()
}

pub fn default_cookie_name() -> String {
    "sso".to_string()
}

pub fn default_session_max_age_days() -> u64 {
    30
}

pub fn default_session_backend() -> SessionBackendKind {
    SessionBackendKind::File
}

pub fn default_session_dir() -> String {
    "sessions".to_string()
}

pub fn default_login_path() -> String {
    "/login".to_string()
}
