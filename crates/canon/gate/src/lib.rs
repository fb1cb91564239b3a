//! Canon Mutation Gate.
//!
//! Every change to governance-controlled registry state passes through a
//! four-stage approval pipeline: technical review, policy review,
//! independent audit, ratification. A stage opens only once the prior
//! stage passed; a failed stage halts the mutation and resubmits in place.
//! Stage four additionally demands a fresh, version-scoped attestation
//! before the registry change is applied and `Completed` recorded.
//!
//! Gate records are never deleted - terminal states are retained forever
//! for replay - and every stage decision lands on the gate's audit chain.

#![deny(unsafe_code)]

mod error;
mod gate;

pub use error::GateError;
pub use gate::{gate_chain, MutationGate};
