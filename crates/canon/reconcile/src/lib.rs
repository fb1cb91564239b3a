//! Canon Reconciliation Engine.
//!
//! Periodically compares a component's locally-held state against
//! canonical truth and scores the divergence on [0, 1]. Each run produces
//! exactly one immutable snapshot, keyed by (component, run time); runs
//! past the threshold raise a suspension request to the ratifying
//! authority. The engine exposes `reconcile` only - scheduling belongs to
//! an external orchestrator.

#![deny(unsafe_code)]

mod engine;
mod error;
mod score;

pub use engine::Reconciler;
pub use error::ReconcileError;
pub use score::discrepancy_score;
