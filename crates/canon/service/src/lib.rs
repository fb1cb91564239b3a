//! Canon Service - the wired canonical-truth engine.
//!
//! One [`CanonEngine`] owns the registry, audit log, violation log, access
//! guard, violation detector, mutation gate, attestation service, and
//! reconciler, wired the way production deploys them: the violation log is
//! the audit log's tamper sink, and every component resolves truth through
//! the one registry. The scheduler collaborator gets a single job-target
//! check; everything else is reached through the component accessors.

#![deny(unsafe_code)]

mod engine;
mod error;

pub use engine::CanonEngine;
pub use error::EngineError;
