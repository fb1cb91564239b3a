//! The violation log and escalation queue.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, RwLock};

use chrono::Utc;
use tracing::warn;

use canon_audit::TamperSink;
use canon_types::{
    AgentId, ChainId, EscalationNotice, GovernanceRole, ResolutionStatus, Severity,
    ViolationEvidence, ViolationId, ViolationKind, ViolationRecord,
};

use crate::error::GuardError;

/// Append-only store of violation records.
///
/// Violations are resolved only by a governance action and never deleted.
/// Auto-escalating severities push an [`EscalationNotice`] onto the queue
/// the ratifying authority drains; minor violations wait for manual review.
pub struct ViolationLog {
    violations: RwLock<HashMap<ViolationId, ViolationRecord>>,
    escalations: Mutex<VecDeque<EscalationNotice>>,
}

impl ViolationLog {
    pub fn new() -> Self {
        Self {
            violations: RwLock::new(HashMap::new()),
            escalations: Mutex::new(VecDeque::new()),
        }
    }

    /// Record a violation, escalating automatically per severity tier.
    pub fn record(
        &self,
        kind: ViolationKind,
        severity: Severity,
        evidence: ViolationEvidence,
    ) -> Result<ViolationRecord, GuardError> {
        self.record_inner(kind, severity, evidence, severity.auto_escalates())
    }

    /// Record a violation without escalation, regardless of severity.
    /// Used for denials by agents holding an override role.
    pub fn record_without_escalation(
        &self,
        kind: ViolationKind,
        severity: Severity,
        evidence: ViolationEvidence,
    ) -> Result<ViolationRecord, GuardError> {
        self.record_inner(kind, severity, evidence, false)
    }

    fn record_inner(
        &self,
        kind: ViolationKind,
        severity: Severity,
        evidence: ViolationEvidence,
        escalate: bool,
    ) -> Result<ViolationRecord, GuardError> {
        let mut violation = ViolationRecord::new(kind, severity, evidence);
        if escalate {
            violation.resolution = ResolutionStatus::Escalated;
        }

        warn!(
            id = %violation.violation_id,
            ?kind,
            ?severity,
            escalated = escalate,
            "violation recorded: {}",
            violation.evidence.description
        );

        let mut violations = self
            .violations
            .write()
            .map_err(|_| GuardError::LockPoisoned)?;
        violations.insert(violation.violation_id, violation.clone());
        drop(violations);

        if escalate {
            let mut queue = self.escalations.lock().map_err(|_| GuardError::LockPoisoned)?;
            queue.push_back(EscalationNotice {
                violation_id: violation.violation_id,
                kind,
                severity,
                raised_at: Utc::now(),
            });
        }
        Ok(violation)
    }

    /// Resolve a violation. Governance action: only a ratifying authority
    /// holder may do this; the record is updated in place, never deleted.
    pub fn resolve(
        &self,
        violation_id: ViolationId,
        by: &AgentId,
        role: GovernanceRole,
        note: impl Into<String>,
    ) -> Result<ViolationRecord, GuardError> {
        if !role.is_ratifying_authority() {
            return Err(GuardError::NotRatifyingAuthority { agent: by.clone() });
        }
        let mut violations = self
            .violations
            .write()
            .map_err(|_| GuardError::LockPoisoned)?;
        let violation = violations
            .get_mut(&violation_id)
            .ok_or(GuardError::ViolationNotFound { violation_id })?;
        violation.resolution = ResolutionStatus::Resolved {
            by: by.clone(),
            at: Utc::now(),
            note: note.into(),
        };
        Ok(violation.clone())
    }

    pub fn get(&self, violation_id: ViolationId) -> Result<Option<ViolationRecord>, GuardError> {
        let violations = self
            .violations
            .read()
            .map_err(|_| GuardError::LockPoisoned)?;
        Ok(violations.get(&violation_id).cloned())
    }

    /// All recorded violations, newest first.
    pub fn all(&self) -> Result<Vec<ViolationRecord>, GuardError> {
        let violations = self
            .violations
            .read()
            .map_err(|_| GuardError::LockPoisoned)?;
        let mut list: Vec<_> = violations.values().cloned().collect();
        list.sort_by(|a, b| b.detected_at.cmp(&a.detected_at));
        Ok(list)
    }

    /// Drain pending escalation notices, oldest first.
    pub fn drain_escalations(&self) -> Result<Vec<EscalationNotice>, GuardError> {
        let mut queue = self.escalations.lock().map_err(|_| GuardError::LockPoisoned)?;
        Ok(queue.drain(..).collect())
    }
}

impl Default for ViolationLog {
    fn default() -> Self {
        Self::new()
    }
}

impl TamperSink for ViolationLog {
    fn tamper_attempt(&self, chain_id: &ChainId, seq: u64, agent: &AgentId) {
        let evidence = ViolationEvidence {
            description: format!("mutation attempted on audit chain '{chain_id}' seq {seq}"),
            agent: Some(agent.clone()),
            ..Default::default()
        };
        // The interception itself already hard-fails the write; a poisoned
        // violation store must not mask that, so the result is dropped.
        let _ = self.record(ViolationKind::TamperAttempt, Severity::Critical, evidence);
    }
}
