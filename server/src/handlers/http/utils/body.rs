use anyhow::{Result, anyhow};
use bytes::Bytes;
use http_body_util::{BodyExt, Limited};
use tracing::debug;

use crate::RequestBody;

/// Upper bound for login forms and JSON credentials.
pub const MAX_BODY_BYTES: usize = 16 * 1024;

/// Read a whole request body, refusing anything over [`MAX_BODY_BYTES`].
pub async fn collect_body(body: RequestBody) -> Result<Bytes> {
    let bytes = Limited::new(body, MAX_BODY_BYTES)
        .collect()
        .await
        .map_err(|e| anyhow!("Failed to read request body: {}", e))?
        .to_bytes();

    debug!("Read request body, size: {} bytes", bytes.len());
    Ok(bytes)
}
