use serde::{Deserialize, Serialize};

/// The fixed token header. Field order is part of the wire format:
/// it always serializes as `{"alg":"HS256","typ":"JWT"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenHeader {
    pub alg: String,
    pub typ: String,
}

impl TokenHeader {
    pub const ALG: &'static str = "HS256";
    pub const TYP: &'static str = "JWT";

    pub fn hs256() -> Self {
        Self {
            alg: Self::ALG.to_string(),
            typ: Self::TYP.to_string(),
        }
    }

    pub fn is_hs256(&self) -> bool {
        self.alg == Self::ALG && self.typ == Self::TYP
    }
}

/// Claims carried by every bearer token.
///
/// Serialized in declaration order: `jti`, `iat`, `name`, `email`, `admin`.
/// There is no `exp` claim; age limits are enforced server-side from `iat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Per-issuance nonce (UUID v4).
    pub jti: String,

    /// Issued-at (Unix timestamp, seconds).
    pub iat: i64,

    pub name: String,

    pub email: String,

    pub admin: bool,
}
