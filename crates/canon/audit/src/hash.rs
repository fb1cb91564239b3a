//! Entry hashing for chain integrity.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::error::AuditError;

/// Compute an entry's self hash.
///
/// `SHA256(prev_hash || canonical-json(payload) || rfc3339(ts))`, with a
/// missing previous hash contributing the empty string. `serde_json`
/// serializes map keys in sorted order, so the payload encoding is
/// canonical for structurally equal values.
pub fn entry_hash(
    prev_hash: Option<&str>,
    payload: &serde_json::Value,
    recorded_at: &DateTime<Utc>,
) -> Result<String, AuditError> {
    let canonical =
        serde_json::to_string(payload).map_err(|e| AuditError::Serialization(e.to_string()))?;

    let mut hasher = Sha256::new();
    hasher.update(prev_hash.unwrap_or("").as_bytes());
    hasher.update(canonical.as_bytes());
    hasher.update(recorded_at.to_rfc3339().as_bytes());
    Ok(hex::encode(hasher.finalize()))
}
