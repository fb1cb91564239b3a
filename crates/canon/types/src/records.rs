//! Persisted record types: registry entries, access and violation records,
//! audit-chain entries, attestations, and reconciliation snapshots.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::contract::DataContract;
use crate::ids::{AgentId, AttestationId, ChainId, GateId, GovernanceRole, RoleId, StoreRef, ViolationId};
use crate::keys::{DomainCategory, TruthKey};

// ── Registry ────────────────────────────────────────────────────────────

/// Lifecycle status of a registry entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    /// Registered but not yet activated by a completed mutation gate.
    Draft,
    /// The one canonical entry for its key.
    Active,
    /// Deactivated by a completed mutation gate. Never deleted.
    Inactive,
}

/// One registry row mapping a truth key to a canonical store.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub key: TruthKey,
    pub category: DomainCategory,
    pub store: StoreRef,
    pub contract: DataContract,
    pub read_roles: BTreeSet<RoleId>,
    pub write_roles: BTreeSet<RoleId>,
    pub status: EntryStatus,
    pub registered_by: AgentId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ── Access ──────────────────────────────────────────────────────────────

/// Kind of store operation being validated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Read,
    Write,
}

/// Execution context of an access request. Only `Production` is
/// fail-closed on non-canonical targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessContext {
    Production,
    Backtest,
    Research,
}

impl AccessContext {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Immutable record of one access validation. Never mutated after insert.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AccessRecord {
    pub agent: AgentId,
    pub operation: OperationKind,
    pub key: TruthKey,
    pub target_store: StoreRef,
    pub context: AccessContext,
    pub authorized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub denial_reason: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

// ── Violations ──────────────────────────────────────────────────────────

/// Classification of a detected violation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    DuplicateDomain,
    DuplicateSeries,
    DuplicateIndicator,
    UnauthorizedAccess,
    ConflictingValues,
    TamperAttempt,
}

impl ViolationKind {
    /// The duplicate-truth kind matching a key's space.
    pub fn duplicate_for(key: &TruthKey) -> Self {
        match key {
            TruthKey::Domain { .. } => Self::DuplicateDomain,
            TruthKey::Series { .. } => Self::DuplicateSeries,
            TruthKey::Indicator { .. } => Self::DuplicateIndicator,
        }
    }
}

/// Severity tier. Drives whether escalation is automatic or awaits manual
/// governance review.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Minor,
    Major,
    Critical,
}

impl Severity {
    pub fn auto_escalates(&self) -> bool {
        matches!(self, Self::Major | Self::Critical)
    }
}

/// Evidence attached to a violation record.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ViolationEvidence {
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<TruthKey>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<AgentId>,
    /// Conflicting store references, offending target first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicting_stores: Vec<StoreRef>,
}

/// Resolution state of a violation. Violations are resolved only by a
/// governance action and never deleted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResolutionStatus {
    Open,
    Escalated,
    Resolved {
        by: AgentId,
        at: DateTime<Utc>,
        note: String,
    },
}

/// One detected violation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ViolationRecord {
    pub violation_id: ViolationId,
    pub kind: ViolationKind,
    pub severity: Severity,
    pub evidence: ViolationEvidence,
    pub resolution: ResolutionStatus,
    pub detected_at: DateTime<Utc>,
}

impl ViolationRecord {
    pub fn new(kind: ViolationKind, severity: Severity, evidence: ViolationEvidence) -> Self {
        Self {
            violation_id: ViolationId::generate(),
            kind,
            severity,
            evidence,
            resolution: ResolutionStatus::Open,
            detected_at: Utc::now(),
        }
    }
}

/// Notice pushed onto the escalation queue for auto-escalating violations.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EscalationNotice {
    pub violation_id: ViolationId,
    pub kind: ViolationKind,
    pub severity: Severity,
    pub raised_at: DateTime<Utc>,
}

// ── Audit chain ─────────────────────────────────────────────────────────

/// One hash-chained audit entry.
///
/// `self_hash = SHA256(prev_hash || canonical-json(payload) || rfc3339(ts))`,
/// where a missing `prev_hash` (sequence 0) contributes the empty string.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub chain_id: ChainId,
    pub seq: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev_hash: Option<String>,
    pub self_hash: String,
    pub payload: serde_json::Value,
    pub agent: AgentId,
    pub recorded_at: DateTime<Utc>,
}

// ── Attestation ─────────────────────────────────────────────────────────

/// Kind of entity an attestation targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Gate,
    RegistryEntry,
}

/// Reference to one attestable entity.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: String,
}

impl EntityRef {
    pub fn gate(gate_id: GateId) -> Self {
        Self {
            kind: EntityKind::Gate,
            id: gate_id.to_string(),
        }
    }

    pub fn registry_entry(key: &TruthKey) -> Self {
        Self {
            kind: EntityKind::RegistryEntry,
            id: key.to_string(),
        }
    }
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.kind {
            EntityKind::Gate => "gate",
            EntityKind::RegistryEntry => "registry-entry",
        };
        write!(f, "{}/{}", kind, self.id)
    }
}

/// Approval or rejection carried by an attestation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttestDecision {
    Approved,
    Rejected,
}

/// A role-signed, version-scoped approval record. Scoped to one entity
/// version; a new version always requires a fresh attestation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Attestation {
    pub attestation_id: AttestationId,
    pub entity: EntityRef,
    pub version: u32,
    pub role: GovernanceRole,
    pub signature: Vec<u8>,
    pub decision: AttestDecision,
    pub attested_at: DateTime<Utc>,
}

// ── Reconciliation ──────────────────────────────────────────────────────

/// Outcome of one reconciliation run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileOutcome {
    Reconciled,
    Divergent,
}

/// Immutable record of one reconciliation run, keyed by
/// (component, run_at).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReconciliationSnapshot {
    pub component: String,
    pub local_state: serde_json::Value,
    pub canonical_state: serde_json::Value,
    /// Discrepancy score in [0, 1].
    pub score: f64,
    pub threshold: f64,
    pub outcome: ReconcileOutcome,
    pub run_at: DateTime<Utc>,
}

/// Suspension request raised to the ratifying authority when a component
/// diverges beyond its threshold.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SuspensionRequest {
    pub component: String,
    pub score: f64,
    pub threshold: f64,
    pub snapshot_run_at: DateTime<Utc>,
    pub raised_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_escalation_tiers() {
        assert!(Severity::Critical.auto_escalates());
        assert!(Severity::Major.auto_escalates());
        assert!(!Severity::Minor.auto_escalates());
        assert!(Severity::Minor < Severity::Major);
        assert!(Severity::Major < Severity::Critical);
    }

    #[test]
    fn duplicate_kind_matches_key_space() {
        assert_eq!(
            ViolationKind::duplicate_for(&TruthKey::domain("prices")),
            ViolationKind::DuplicateDomain
        );
        assert_eq!(
            ViolationKind::duplicate_for(&TruthKey::indicator("rsi", "v1", "wilder")),
            ViolationKind::DuplicateIndicator
        );
    }

    #[test]
    fn entity_ref_display() {
        let gate = GateId::generate();
        assert_eq!(EntityRef::gate(gate).to_string(), format!("gate/{gate}"));
        assert_eq!(
            EntityRef::registry_entry(&TruthKey::domain("prices")).to_string(),
            "registry-entry/domain:prices"
        );
    }

    #[test]
    fn new_violation_starts_open() {
        let violation = ViolationRecord::new(
            ViolationKind::UnauthorizedAccess,
            Severity::Major,
            ViolationEvidence {
                description: "write to non-canonical store".into(),
                ..Default::default()
            },
        );
        assert_eq!(violation.resolution, ResolutionStatus::Open);
    }
}
