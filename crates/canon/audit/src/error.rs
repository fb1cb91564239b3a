use canon_types::ChainId;
use thiserror::Error;

/// Errors from the audit log.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuditError {
    #[error("immutable write attempt on chain '{chain_id}' seq {seq}: audit rows are append-only")]
    ImmutableWriteAttempt { chain_id: ChainId, seq: u64 },

    #[error("chain '{chain_id}' integrity failure at seq {first_bad_seq}")]
    ChainIntegrityFailure {
        chain_id: ChainId,
        first_bad_seq: u64,
    },

    #[error("payload serialization failed: {0}")]
    Serialization(String),

    #[error("audit store lock poisoned")]
    LockPoisoned,
}
