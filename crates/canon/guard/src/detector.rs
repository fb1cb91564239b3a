//! Duplicate-truth detection.

use std::sync::Arc;

use tracing::error;

use canon_registry::Registry;
use canon_types::{
    EntryStatus, Severity, TruthKey, ViolationEvidence, ViolationKind, ViolationRecord,
};

use crate::error::GuardError;
use crate::violations::ViolationLog;

/// Scans the registry for multi-truth conditions.
///
/// The registry's own invariant should make more than one active row per
/// key impossible; seeing one anyway means the invariant was bypassed, so
/// the finding is always critical and escalates straight to the ratifying
/// authority.
pub struct ViolationDetector {
    registry: Arc<Registry>,
    violations: Arc<ViolationLog>,
}

impl ViolationDetector {
    pub fn new(registry: Arc<Registry>, violations: Arc<ViolationLog>) -> Self {
        Self {
            registry,
            violations,
        }
    }

    /// Check one key for duplicate active truth.
    ///
    /// Returns the violation recorded, or `None` when the key is healthy.
    pub fn detect_multi_truth(
        &self,
        key: &TruthKey,
    ) -> Result<Option<ViolationRecord>, GuardError> {
        let active = self.registry.active_count(key)?;
        if active <= 1 {
            return Ok(None);
        }

        let stores: Vec<_> = self
            .registry
            .history(key)?
            .into_iter()
            .filter(|e| e.status == EntryStatus::Active)
            .map(|e| e.store)
            .collect();

        error!(
            key = %key,
            active,
            "registry invariant bypassed: multiple active canonical stores"
        );

        let violation = self.violations.record(
            ViolationKind::duplicate_for(key),
            Severity::Critical,
            ViolationEvidence {
                description: format!("{active} active canonical stores for {key}"),
                key: Some(key.clone()),
                agent: None,
                conflicting_stores: stores,
            },
        )?;
        Ok(Some(violation))
    }
}
