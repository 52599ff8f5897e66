//! Url-safe, unpadded base64 used for every token segment.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("invalid base64url segment: {0}")]
pub struct DecodeError(#[from] base64::DecodeError);

pub fn encode(part: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(part)
}

/// Rejects characters outside the url-safe alphabet, any `=` padding,
/// lengths that cannot come from unpadded input and non-zero trailing bits.
pub fn decode(part: &str) -> Result<Vec<u8>, DecodeError> {
    Ok(URL_SAFE_NO_PAD.decode(part)?)
}
