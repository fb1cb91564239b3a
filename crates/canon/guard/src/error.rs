use canon_audit::AuditError;
use canon_registry::RegistryError;
use canon_types::{AgentId, StoreRef, TruthKey, ViolationId};
use thiserror::Error;

/// Errors from the access guard and violation detector.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GuardError {
    /// Production access to a non-canonical store. The denial carries its
    /// evidence references; the access record and violation are already
    /// persisted when this surfaces.
    #[error(
        "access denied for {agent}: {key} resolves to '{canonical_store}', not '{target_store}'"
    )]
    AccessDenied {
        agent: AgentId,
        key: TruthKey,
        target_store: StoreRef,
        canonical_store: StoreRef,
        violation_id: ViolationId,
    },

    #[error("only the ratifying authority may resolve violations, {agent} is not")]
    NotRatifyingAuthority { agent: AgentId },

    #[error("violation {violation_id} not found")]
    ViolationNotFound { violation_id: ViolationId },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Audit(#[from] AuditError),

    #[error("guard store lock poisoned")]
    LockPoisoned,
}
