//! Canon Attestation Service.
//!
//! Records role-signed approvals that gate-stage and activation decisions
//! require. Attestations are scoped to one entity *version*: a new version
//! always requires a fresh attestation, prior ones never carry forward.
//!
//! Key lifecycle (issuance, rotation, revocation) belongs to an external
//! collaborator behind the [`KeyCustody`] trait; this crate only consumes
//! `sign`/`verify`/`is_key_valid`.

#![deny(unsafe_code)]

mod custody;
mod error;
mod service;

pub use custody::{signing_payload, KeyCustody, MockKeyCustody};
pub use error::AttestError;
pub use service::AttestationService;
