use canon_types::{ContractError, GateId, GateState, StoreRef, TruthKey};
use thiserror::Error;

/// Errors from the registry.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RegistryError {
    /// A draft or active entry already claims the key. Duplicate truths
    /// are always rejected, never merged; retry means resubmitting
    /// through the mutation gate, not forcing a second truth.
    #[error("uniqueness violation for {key}: store '{existing_store}' already claims this key")]
    UniquenessViolation {
        key: TruthKey,
        existing_store: StoreRef,
    },

    /// No active canonical entry for the key. Hard failure; resolution
    /// never defaults silently.
    #[error("no active canonical entry for {key}")]
    UnresolvedKey { key: TruthKey },

    #[error("no draft entry awaiting activation for {key}")]
    DraftNotFound { key: TruthKey },

    #[error("contract rejected: {0}")]
    InvalidContract(#[from] ContractError),

    /// The presented gate record does not authorize a registry change.
    #[error("gate {gate_id} in state {state} does not authorize registry mutation")]
    GateIncomplete { gate_id: GateId, state: GateState },

    #[error("registry lock poisoned")]
    LockPoisoned,
}
