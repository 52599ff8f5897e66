//! HMAC-SHA256 signing with a process-wide key.

use std::fmt;

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Length of a full, untruncated signature.
pub const SIGNATURE_LEN: usize = 32;

/// Secret key material. Built once at startup and shared read-only.
#[derive(Clone)]
pub struct SecretKey(Vec<u8>);

impl SecretKey {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<&str> for SecretKey {
    fn from(s: &str) -> Self {
        Self::new(s.as_bytes())
    }
}

impl From<String> for SecretKey {
    fn from(s: String) -> Self {
        Self::new(s.into_bytes())
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretKey([REDACTED; {}])", self.0.len())
    }
}

fn mac_for(key: &SecretKey) -> HmacSha256 {
    // HMAC accepts keys of any length, so this cannot fail.
    #[allow(clippy::expect_used)]
    HmacSha256::new_from_slice(key.as_bytes()).expect("HMAC accepts keys of any size")
}

/// HMAC-SHA256 over the UTF-8 bytes of `message`.
pub fn sign(message: &str, key: &SecretKey) -> Vec<u8> {
    let mut mac = mac_for(key);
    mac.update(message.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

/// Recompute the signature for `message` and compare it with `signature`
/// in constant time.
pub fn verify(message: &str, key: &SecretKey, signature: &[u8]) -> bool {
    let mut mac = mac_for(key);
    mac.update(message.as_bytes());
    mac.verify_slice(signature).is_ok()
}
