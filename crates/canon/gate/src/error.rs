use canon_attest::AttestError;
use canon_audit::AuditError;
use canon_registry::RegistryError;
use canon_types::{AgentId, GateId, GateStage, GateState, GovernanceRole};
use thiserror::Error;

/// Errors from the mutation gate.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GateError {
    #[error("gate {gate_id} not found")]
    GateNotFound { gate_id: GateId },

    #[error("gate {gate_id} is terminal ({state}); terminal records are immutable")]
    TerminalState { gate_id: GateId, state: GateState },

    /// Evidence recorded for a stage whose predecessors have not passed.
    #[error("gate {gate_id} awaits {expected}, cannot record {got}")]
    StageOutOfOrder {
        gate_id: GateId,
        expected: GateStage,
        got: GateStage,
    },

    /// A concurrent sign-off already advanced this stage; the first valid
    /// signature committed, this one is stale.
    #[error("gate {gate_id} stage {stage} already recorded; transition is stale")]
    StaleTransition { gate_id: GateId, stage: GateStage },

    #[error("gate {gate_id} stage {stage} failed; resubmit the stage before recording")]
    ResubmissionRequired { gate_id: GateId, stage: GateStage },

    #[error("stage {stage} requires role {required}, approver holds {got}")]
    WrongRole {
        stage: GateStage,
        required: GovernanceRole,
        got: GovernanceRole,
    },

    /// The independent auditor must differ from the stage-1 and stage-2
    /// reviewers.
    #[error("stage {stage} requires an approver distinct from earlier reviewers, got {approver}")]
    DistinctApproverRequired { stage: GateStage, approver: AgentId },

    #[error("gate {gate_id} version {version} lacks an approved attestation for ratification")]
    AttestationRequired { gate_id: GateId, version: u32 },

    #[error("only the requester may cancel gate {gate_id}, not {agent}")]
    NotRequester { gate_id: GateId, agent: AgentId },

    #[error("rejecting a gate requires the ratifying authority, {agent} lacks it")]
    AuthorityRequired { agent: AgentId },

    #[error("gate transition {from} -> {to} is not in the allowed-transitions table")]
    InvalidTransition { from: GateState, to: GateState },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Attest(#[from] AttestError),

    #[error(transparent)]
    Audit(#[from] AuditError),

    #[error("gate store lock poisoned")]
    LockPoisoned,
}
