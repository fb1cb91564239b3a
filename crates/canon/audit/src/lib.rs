//! Canon Audit Log - append-only, hash-chained record store.
//!
//! Everything else in the canonical-truth layer depends on this crate.
//! Records are stored arena-style per chain, indexed by a monotonically
//! increasing sequence number; "previous" is `seq - 1`, which keeps
//! verification linear. Any attempted update or delete is intercepted,
//! reported to the tamper sink, and hard-failed - the write never succeeds.

#![deny(unsafe_code)]

mod error;
mod hash;
mod log;

pub use error::AuditError;
pub use hash::entry_hash;
pub use log::{AuditLog, ChainReport, TamperSink};
