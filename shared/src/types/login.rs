use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Login wire types
// ---------------------------------------------------------------------------

/// Credentials posted to `/login` (form) or `/api/token` (JSON).
#[derive(Debug, Deserialize)]
pub struct LoginData {
    #[serde(alias = "username")]
    pub email: String,
    pub password: String,
}

/// Successful / failed login response envelope.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LoginResponse {
    Success {
        name: String,
        message: String,
        redirect: String,
    },
    Error {
        code: String,
        message: String,
    },
}

/// Body returned by `/api/token`.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub jwt: String,
}

/// Body accepted by `/authn`.
#[derive(Debug, Deserialize)]
pub struct AuthnRequest {
    #[serde(default)]
    pub jwt: String,
}

// ---------------------------------------------------------------------------
// Login errors
// ---------------------------------------------------------------------------

pub enum LoginError {
    InvalidCredentials,
    MissingField(String),
    UserStoreError,
    SessionError,
    InternalError,
}

impl LoginError {
    pub fn to_code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::MissingField(_) => "MISSING_FIELD",
            Self::UserStoreError => "USER_STORE_ERROR",
            Self::SessionError => "SESSION_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    pub fn to_message(&self) -> String {
        match self {
            Self::InvalidCredentials => "Email or password incorrect".to_string(),
            Self::MissingField(field) => format!("Missing required field: {}", field),
            Self::UserStoreError => "User lookup failed".to_string(),
            Self::SessionError => "Could not start a session".to_string(),
            Self::InternalError => "An internal error occurred".to_string(),
        }
    }

    pub fn to_response(&self) -> LoginResponse {
        LoginResponse::Error {
            code: self.to_code().to_string(),
            message: self.to_message(),
        }
    }
}
