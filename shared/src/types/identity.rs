use serde::{Deserialize, Serialize};

/// A verified user identity attached to a request.
///
/// Only ever produced by the token service or the session store (or loaded
/// from the user store at login). Which fields are present depends on where
/// it came from:
///
/// | source        | `id`   | `email` |
/// |---------------|--------|---------|
/// | user store    | `Some` | `Some`  |
/// | bearer token  | `None` | `Some`  |
/// | session       | `Some` | `None`  |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "admin", default)]
    pub is_admin: bool,
}

impl Identity {
    pub fn new(name: impl Into<String>, email: impl Into<String>, is_admin: bool) -> Self {
        Self {
            id: None,
            name: name.into(),
            email: Some(email.into()),
            is_admin,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// A user row as held by the user store.
///
/// `password_hash` is an Argon2 PHC string; plaintext passwords are never
/// stored or compared.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub admin: bool,
    pub password_hash: String,
    /// Unix timestamp (seconds).
    #[serde(default)]
    pub created: i64,
}

impl UserRecord {
    /// The public part of the record, safe to attach to a request.
    pub fn identity(&self) -> Identity {
        Identity {
            id: Some(self.id.clone()),
            name: self.name.clone(),
            email: Some(self.email.clone()),
            is_admin: self.admin,
        }
    }
}
