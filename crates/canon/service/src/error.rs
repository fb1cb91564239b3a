use canon_attest::AttestError;
use canon_audit::AuditError;
use canon_gate::GateError;
use canon_guard::GuardError;
use canon_reconcile::ReconcileError;
use canon_registry::RegistryError;
use thiserror::Error;

/// Errors surfaced by the wired engine.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Audit(#[from] AuditError),

    #[error(transparent)]
    Guard(#[from] GuardError),

    #[error(transparent)]
    Gate(#[from] GateError),

    #[error(transparent)]
    Attest(#[from] AttestError),

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
}
