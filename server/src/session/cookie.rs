//! Signed session-id cookie values.
//!
//! A cookie value is `{session_id}.{signature}` where the signature is the
//! base64url HMAC-SHA256 of the session id under the session key. Only a
//! value that verifies is ever used to look up a record.

use rand::RngCore;
use rand::rngs::OsRng;
use tracing::warn;

use crate::auth::codec;
use crate::auth::signer::{self, SecretKey};

const SESSION_ID_BYTES: usize = 32;

/// A fresh, unguessable session id (base64url of 32 random bytes).
pub fn generate_session_id() -> Result<String, rand::Error> {
    let mut bytes = [0u8; SESSION_ID_BYTES];
    OsRng.try_fill_bytes(&mut bytes)?;
    Ok(codec::encode(&bytes))
}

/// Session ids are used as file names, so only the base64url alphabet is
/// accepted.
pub fn is_valid_session_id(session_id: &str) -> bool {
    !session_id.is_empty()
        && session_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

pub fn sign_session_id(session_id: &str, key: &SecretKey) -> String {
    let signature = signer::sign(session_id, key);
    format!("{}.{}", session_id, codec::encode(&signature))
}

/// Returns the session id if `cookie_value` carries a valid signature.
pub fn verify_cookie_value(cookie_value: &str, key: &SecretKey) -> Option<String> {
    let (session_id, signature_b64) = cookie_value.rsplit_once('.')?;
    if !is_valid_session_id(session_id) {
        return None;
    }

    let signature = codec::decode(signature_b64).ok()?;
    if signer::verify(session_id, key, &signature) {
        Some(session_id.to_owned())
    } else {
        warn!(
            "Session cookie tampered, prefix={}...",
            cookie_value.chars().take(8).collect::<String>()
        );
        None
    }
}

/// First eight characters, for logs.
pub fn id_prefix(session_id: &str) -> String {
    session_id.chars().take(8).collect()
}
