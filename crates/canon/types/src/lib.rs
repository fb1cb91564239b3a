//! Canon Types - shared vocabulary of the canonical-truth layer.
//!
//! Every other canon crate speaks in these types: truth keys, registry
//! entries, access and violation records, the mutation-gate state machine,
//! audit-chain entries, attestations, and reconciliation snapshots.

#![deny(unsafe_code)]

mod contract;
mod gate;
mod ids;
mod keys;
mod records;

pub use contract::{ContractError, ContractOption, DataContract, RevisionPolicy};
pub use gate::{GateStage, GateState, MutationAction, MutationGateRecord, StageSlot};
pub use ids::{
    AgentId, AttestationId, ChainId, GateId, GovernanceRole, RoleId, StoreRef, ViolationId,
};
pub use keys::{DomainCategory, Frequency, PriceType, TruthKey};
pub use records::{
    AccessContext, AccessRecord, AttestDecision, Attestation, AuditLogEntry, EntityKind,
    EntityRef, EntryStatus, EscalationNotice, OperationKind, ReconcileOutcome,
    ReconciliationSnapshot, RegistryEntry, ResolutionStatus, Severity, SuspensionRequest,
    ViolationEvidence, ViolationKind, ViolationRecord,
};
