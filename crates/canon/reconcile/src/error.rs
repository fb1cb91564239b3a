use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors from the reconciliation engine.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ReconcileError {
    /// A snapshot already exists for this (component, run time); duplicate
    /// concurrent runs are rejected by the idempotency key.
    #[error("reconciliation for '{component}' at {run_at} already recorded")]
    DuplicateRun {
        component: String,
        run_at: DateTime<Utc>,
    },

    #[error("threshold {0} is outside [0, 1]")]
    InvalidThreshold(f64),

    #[error("reconciliation store lock poisoned")]
    LockPoisoned,
}
