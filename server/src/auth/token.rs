//! Issue and authenticate self-signed bearer tokens.
//!
//! Wire format:
//! `b64(header) "." b64(claims) "." b64(hmac_sha256(b64(header) "." b64(claims)))`
//! with the url-safe unpadded alphabet and a fixed `HS256` header.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rand::RngCore;
use rand::rngs::OsRng;
use thiserror::Error;
use tracing::{debug, warn};

use sso_shared::types::server_config::{AuthConfig, ConfigError};
use sso_shared::types::{Identity, TokenClaims, TokenHeader};

use super::codec;
use super::signer::{self, SecretKey};

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("malformed token payload: {0}")]
    MalformedPayload(String),

    #[error("token expired")]
    Expired,

    #[error("failed to encode token: {0}")]
    Encoding(String),

    #[error("failed to generate nonce: {0}")]
    NonceGeneration(String),
}

impl TokenError {
    /// Short machine-readable code for JSON error bodies.
    pub fn to_code(&self) -> &'static str {
        match self {
            Self::Malformed => "MALFORMED_TOKEN",
            Self::InvalidSignature => "INVALID_SIGNATURE",
            Self::MalformedPayload(_) => "MALFORMED_PAYLOAD",
            Self::Expired => "TOKEN_EXPIRED",
            Self::Encoding(_) | Self::NonceGeneration(_) => "INTERNAL_ERROR",
        }
    }
}

#[derive(Debug, Clone)]
pub struct TokenService {
    secret: SecretKey,
    max_age: Option<Duration>,
}

impl TokenService {
    pub fn new(secret: SecretKey) -> Self {
        Self {
            secret,
            max_age: None,
        }
    }

    /// Reject tokens issued more than `max_age` ago.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    pub fn from_config(config: &AuthConfig) -> Result<Self, ConfigError> {
        let secret = config
            .resolved_token_secret()
            .ok_or_else(|| ConfigError::InvalidConfig("token secret is not set".into()))?;

        let service = Self::new(SecretKey::from(secret));
        Ok(match config.token_max_age_secs() {
            Some(secs) => service.with_max_age(Duration::from_secs(secs)),
            None => service,
        })
    }

    /// Issue a signed token for `identity`.
    pub fn create(&self, identity: &Identity) -> Result<String, TokenError> {
        let claims = TokenClaims {
            jti: generate_nonce()?,
            iat: unix_now(),
            name: identity.name.clone(),
            email: identity.email.clone().unwrap_or_default(),
            admin: identity.is_admin,
        };
        self.encode_claims(&claims)
    }

    fn encode_claims(&self, claims: &TokenClaims) -> Result<String, TokenError> {
        let header = serde_json::to_vec(&TokenHeader::hs256())
            .map_err(|e| TokenError::Encoding(e.to_string()))?;
        let payload =
            serde_json::to_vec(claims).map_err(|e| TokenError::Encoding(e.to_string()))?;

        let signing_input = format!("{}.{}", codec::encode(&header), codec::encode(&payload));
        let signature = codec::encode(&signer::sign(&signing_input, &self.secret));

        debug!("Issued token jti={}", claims.jti);
        Ok(format!("{}.{}", signing_input, signature))
    }

    /// Verify `token` and return the identity it carries.
    ///
    /// Nothing in the payload is read until the signature has been checked.
    pub fn authenticate(&self, token: &str) -> Result<Identity, TokenError> {
        let parts: Vec<&str> = token.split('.').collect();
        let [header_b64, payload_b64, signature_b64] = parts.as_slice() else {
            warn!("Rejected token with {} segments", parts.len());
            return Err(TokenError::Malformed);
        };

        let signature = codec::decode(signature_b64).map_err(|_| {
            warn!("Rejected token: undecodable signature");
            TokenError::InvalidSignature
        })?;
        let signing_input = format!("{}.{}", header_b64, payload_b64);
        if !signer::verify(&signing_input, &self.secret, &signature) {
            warn!("Rejected token: signature mismatch");
            return Err(TokenError::InvalidSignature);
        }

        let header: TokenHeader = codec::decode(header_b64)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .ok_or(TokenError::Malformed)?;
        if !header.is_hs256() {
            return Err(TokenError::Malformed);
        }

        let payload =
            codec::decode(payload_b64).map_err(|e| TokenError::MalformedPayload(e.to_string()))?;
        let claims: TokenClaims = serde_json::from_slice(&payload)
            .map_err(|e| TokenError::MalformedPayload(e.to_string()))?;

        if let Some(max_age) = self.max_age {
            let age = unix_now().saturating_sub(claims.iat);
            if age < 0 || age as u64 > max_age.as_secs() {
                warn!("Rejected token jti={}: outside max age", claims.jti);
                return Err(TokenError::Expired);
            }
        }

        Ok(Identity {
            id: None,
            name: claims.name,
            email: Some(claims.email),
            is_admin: claims.admin,
        })
    }
}

/// UUID v4 built from OS randomness; surfaces RNG failure instead of
/// panicking.
fn generate_nonce() -> Result<String, TokenError> {
    let mut bytes = [0u8; 16];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| TokenError::NonceGeneration(e.to_string()))?;
    Ok(uuid::Builder::from_random_bytes(bytes)
        .into_uuid()
        .to_string())
}

pub(crate) fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
