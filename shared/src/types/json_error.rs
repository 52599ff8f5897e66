use serde::{Deserialize, Serialize};

use super::login::LoginError;

/// JSON body of every error the server answers with:
/// `{"status":"error","code":"...","message":"..."}`.
///
/// `message` is shown to clients and never carries internal error text.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: &str, message: &str) -> Self {
        Self {
            status: "error".to_string(),
            code: code.to_string(),
            message: message.to_string(),
        }
    }
}

impl From<&LoginError> for ErrorResponse {
    fn from(err: &LoginError) -> Self {
        Self::new(err.to_code(), &err.to_message())
    }
}
