use canon_types::GovernanceRole;
use thiserror::Error;

/// Errors from the attestation service.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AttestError {
    #[error("no currently valid signing credential for role {role}")]
    KeyInvalid { role: GovernanceRole },

    #[error("signature does not verify for role {role}")]
    SignatureInvalid { role: GovernanceRole },

    #[error("attestation store lock poisoned")]
    LockPoisoned,
}
