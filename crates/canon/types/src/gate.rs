//! Mutation-gate state machine types.
//!
//! Gate status is one explicit finite-state value with an explicit
//! allowed-transitions table, validated before every write. No status is
//! ever inferred from combinations of booleans.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::contract::DataContract;
use crate::ids::{AgentId, GateId, GovernanceRole};
use crate::keys::TruthKey;

/// The four approval stages, in order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateStage {
    Technical,
    Policy,
    IndependentAudit,
    Ratification,
}

impl GateStage {
    pub const ALL: [GateStage; 4] = [
        Self::Technical,
        Self::Policy,
        Self::IndependentAudit,
        Self::Ratification,
    ];

    /// 1-based stage number.
    pub fn number(&self) -> u8 {
        match self {
            Self::Technical => 1,
            Self::Policy => 2,
            Self::IndependentAudit => 3,
            Self::Ratification => 4,
        }
    }

    /// Zero-based slot index into a gate record's stage slots.
    pub fn index(&self) -> usize {
        self.number() as usize - 1
    }

    /// The next stage, or `None` after ratification.
    pub fn next(&self) -> Option<GateStage> {
        match self {
            Self::Technical => Some(Self::Policy),
            Self::Policy => Some(Self::IndependentAudit),
            Self::IndependentAudit => Some(Self::Ratification),
            Self::Ratification => None,
        }
    }

    /// The role capability required to sign off this stage.
    pub fn required_role(&self) -> GovernanceRole {
        match self {
            Self::Technical => GovernanceRole::TechnicalReviewer,
            Self::Policy => GovernanceRole::PolicyReviewer,
            Self::IndependentAudit => GovernanceRole::IndependentAuditor,
            Self::Ratification => GovernanceRole::RatifyingAuthority,
        }
    }
}

impl std::fmt::Display for GateStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Technical => write!(f, "stage-1-technical"),
            Self::Policy => write!(f, "stage-2-policy"),
            Self::IndependentAudit => write!(f, "stage-3-independent-audit"),
            Self::Ratification => write!(f, "stage-4-ratification"),
        }
    }
}

/// Overall state of a mutation gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum GateState {
    /// Awaiting sign-off for the given stage.
    Pending { stage: GateStage },
    /// The given stage passed; transient until the next stage opens or the
    /// registry change is applied.
    Passed { stage: GateStage },
    /// The given stage failed; resubmission restarts from this stage.
    Failed { stage: GateStage },
    /// All four stages passed and the registry change was applied. Terminal.
    Completed,
    /// Governance rejected the mutation outright. Terminal.
    Rejected,
    /// The requester withdrew the mutation. Terminal.
    Cancelled,
}

impl GateState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Rejected | Self::Cancelled)
    }

    /// The allowed-transitions table. Every write to a gate record checks
    /// this first; anything not listed here is an invalid transition.
    pub fn can_transition(&self, to: &GateState) -> bool {
        match (self, to) {
            (Self::Pending { stage: s }, Self::Passed { stage: t }) => s == t,
            (Self::Pending { stage: s }, Self::Failed { stage: t }) => s == t,
            (Self::Pending { .. }, Self::Cancelled) => true,
            (Self::Passed { stage: s }, Self::Pending { stage: t }) => s.next() == Some(*t),
            (Self::Passed { stage: s }, Self::Completed) => *s == GateStage::Ratification,
            (Self::Failed { stage: s }, Self::Pending { stage: t }) => s == t,
            (Self::Failed { .. }, Self::Rejected) => true,
            (Self::Failed { .. }, Self::Cancelled) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for GateState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending { stage } => write!(f, "pending({stage})"),
            Self::Passed { stage } => write!(f, "passed({stage})"),
            Self::Failed { stage } => write!(f, "failed({stage})"),
            Self::Completed => write!(f, "completed"),
            Self::Rejected => write!(f, "rejected"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// The registry change a gate guards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum MutationAction {
    /// Activate the draft entry registered for the key.
    Register,
    /// Deactivate the active entry for the key.
    Deactivate,
    /// Replace the active entry's contract.
    AmendContract { contract: DataContract },
}

impl std::fmt::Display for MutationAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Register => write!(f, "register"),
            Self::Deactivate => write!(f, "deactivate"),
            Self::AmendContract { .. } => write!(f, "amend-contract"),
        }
    }
}

/// One recorded stage sign-off.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StageSlot {
    pub stage: GateStage,
    pub approver: AgentId,
    pub role: GovernanceRole,
    pub evidence: serde_json::Value,
    pub passed: bool,
    pub recorded_at: DateTime<Utc>,
}

/// One proposed registry mutation and its approval trail.
///
/// Never deleted; terminal records are retained forever for replay.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MutationGateRecord {
    pub gate_id: GateId,
    pub action: MutationAction,
    pub key: TruthKey,
    pub requester: AgentId,
    /// Four stage slots, filled in order as stages are signed off.
    pub stages: [Option<StageSlot>; 4],
    pub state: GateState,
    /// Version of this record for attestation scoping. Bumped on every
    /// resubmission so prior attestations never carry forward.
    pub version: u32,
    /// Whether stages 1-3 were compressed under the emergency path.
    pub emergency: bool,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decided_at: Option<DateTime<Utc>>,
}

impl MutationGateRecord {
    pub fn new(action: MutationAction, key: TruthKey, requester: AgentId) -> Self {
        Self {
            gate_id: GateId::generate(),
            action,
            key,
            requester,
            stages: [None, None, None, None],
            state: GateState::Pending {
                stage: GateStage::Technical,
            },
            version: 1,
            emergency: false,
            created_at: Utc::now(),
            decided_at: None,
        }
    }

    /// The slot recorded for a stage, if any.
    pub fn slot(&self, stage: GateStage) -> Option<&StageSlot> {
        self.stages[stage.index()].as_ref()
    }

    /// Approvers of all stages recorded so far.
    pub fn approvers(&self) -> Vec<&AgentId> {
        self.stages
            .iter()
            .flatten()
            .map(|slot| &slot.approver)
            .collect()
    }

    /// Whether every stage slot is filled and passed.
    pub fn all_stages_passed(&self) -> bool {
        self.stages
            .iter()
            .all(|slot| slot.as_ref().is_some_and(|s| s.passed))
    }
}
