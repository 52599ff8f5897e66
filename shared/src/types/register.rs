use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Registration wire types
// ---------------------------------------------------------------------------

/// Form posted to `/register`.
#[derive(Debug, Deserialize)]
pub struct RegisterData {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub password_confirm: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RegisterResponse {
    Success {
        id: String,
        name: String,
        message: String,
        redirect: String,
    },
    Error {
        code: String,
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Registration errors
// ---------------------------------------------------------------------------

pub enum RegisterError {
    MissingField(String),
    InvalidName,
    InvalidEmail,
    InvalidPassword,
    PasswordMismatch,
    EmailTaken,
    UserStoreError,
    InternalError,
}

impl RegisterError {
    pub fn to_code(&self) -> &'static str {
        match self {
            Self::MissingField(_) => "MISSING_FIELD",
            Self::InvalidName => "INVALID_NAME",
            Self::InvalidEmail => "INVALID_EMAIL",
            Self::InvalidPassword => "INVALID_PASSWORD",
            Self::PasswordMismatch => "PASSWORD_MISMATCH",
            Self::EmailTaken => "EMAIL_TAKEN",
            Self::UserStoreError => "USER_STORE_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    pub fn to_message(&self) -> String {
        match self {
            Self::MissingField(field) => format!("Missing required field: {}", field),
            Self::InvalidName => "Name must be 1-64 characters".to_string(),
            Self::InvalidEmail => "Invalid email format".to_string(),
            Self::InvalidPassword => {
                "Password must be 8-128 characters with at least one letter and one number"
                    .to_string()
            }
            Self::PasswordMismatch => "Passwords do not match".to_string(),
            Self::EmailTaken => "Email address already taken".to_string(),
            Self::UserStoreError => "Could not save the new user".to_string(),
            Self::InternalError => "An internal error occurred".to_string(),
        }
    }

    pub fn to_response(&self) -> RegisterResponse {
        RegisterResponse::Error {
            code: self.to_code().to_string(),
            message: self.to_message(),
        }
    }
}
