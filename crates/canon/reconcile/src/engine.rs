//! Snapshot recording and suspension escalation.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, RwLock};

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use canon_types::{ReconcileOutcome, ReconciliationSnapshot, SuspensionRequest};

use crate::error::ReconcileError;
use crate::score::discrepancy_score;

/// Runs reconciliations and keeps their immutable snapshots.
///
/// Runs for different components never contend; two runs for the same
/// (component, run time) are prevented by the idempotency key.
pub struct Reconciler {
    snapshots: RwLock<HashMap<(String, DateTime<Utc>), ReconciliationSnapshot>>,
    suspensions: Mutex<VecDeque<SuspensionRequest>>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self {
            snapshots: RwLock::new(HashMap::new()),
            suspensions: Mutex::new(VecDeque::new()),
        }
    }

    /// Compare local state against canonical truth.
    ///
    /// Produces exactly one immutable snapshot. A score past the threshold
    /// yields `Divergent` and raises a suspension request for the
    /// ratifying authority; that is a governance escalation, not an error.
    pub fn reconcile(
        &self,
        component: &str,
        local_state: serde_json::Value,
        canonical_state: serde_json::Value,
        threshold: f64,
        run_at: DateTime<Utc>,
    ) -> Result<ReconciliationSnapshot, ReconcileError> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ReconcileError::InvalidThreshold(threshold));
        }

        let score = discrepancy_score(&local_state, &canonical_state);
        let outcome = if score > threshold {
            ReconcileOutcome::Divergent
        } else {
            ReconcileOutcome::Reconciled
        };

        let snapshot = ReconciliationSnapshot {
            component: component.to_string(),
            local_state,
            canonical_state,
            score,
            threshold,
            outcome,
            run_at,
        };

        let mut snapshots = self
            .snapshots
            .write()
            .map_err(|_| ReconcileError::LockPoisoned)?;
        let key = (component.to_string(), run_at);
        if snapshots.contains_key(&key) {
            return Err(ReconcileError::DuplicateRun {
                component: component.to_string(),
                run_at,
            });
        }
        snapshots.insert(key, snapshot.clone());
        drop(snapshots);

        match outcome {
            ReconcileOutcome::Reconciled => {
                info!(component, score, threshold, "component reconciled");
            }
            ReconcileOutcome::Divergent => {
                warn!(
                    component,
                    score, threshold, "component divergent, raising suspension request"
                );
                let mut queue = self
                    .suspensions
                    .lock()
                    .map_err(|_| ReconcileError::LockPoisoned)?;
                queue.push_back(SuspensionRequest {
                    component: component.to_string(),
                    score,
                    threshold,
                    snapshot_run_at: run_at,
                    raised_at: Utc::now(),
                });
            }
        }
        Ok(snapshot)
    }

    /// The snapshot recorded for one (component, run time), if any.
    pub fn snapshot(
        &self,
        component: &str,
        run_at: DateTime<Utc>,
    ) -> Result<Option<ReconciliationSnapshot>, ReconcileError> {
        let snapshots = self
            .snapshots
            .read()
            .map_err(|_| ReconcileError::LockPoisoned)?;
        Ok(snapshots.get(&(component.to_string(), run_at)).cloned())
    }

    /// All snapshots for a component, oldest first.
    pub fn snapshots_for(
        &self,
        component: &str,
    ) -> Result<Vec<ReconciliationSnapshot>, ReconcileError> {
        let snapshots = self
            .snapshots
            .read()
            .map_err(|_| ReconcileError::LockPoisoned)?;
        let mut list: Vec<_> = snapshots
            .values()
            .filter(|s| s.component == component)
            .cloned()
            .collect();
        list.sort_by_key(|s| s.run_at);
        Ok(list)
    }

    /// Drain pending suspension requests, oldest first.
    pub fn drain_suspensions(&self) -> Result<Vec<SuspensionRequest>, ReconcileError> {
        let mut queue = self
            .suspensions
            .lock()
            .map_err(|_| ReconcileError::LockPoisoned)?;
        Ok(queue.drain(..).collect())
    }
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new()
    }
}
