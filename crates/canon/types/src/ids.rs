//! Identity newtypes and governance roles.

use serde::{Deserialize, Serialize};

use crate::gate::GateStage;

/// Identity of an autonomous agent (writer, reviewer, or operator).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentId(pub String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named access role granted read or write rights on a domain.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RoleId(pub String);

impl RoleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for RoleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to a physical store (table, bucket, topic) holding a domain's data.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoreRef(pub String);

impl StoreRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

impl std::fmt::Display for StoreRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of one audit hash chain. Appends to different chains are
/// independent; appends to the same chain serialize on its tail.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainId(pub String);

impl ChainId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for ChainId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub uuid::Uuid);

        impl $name {
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Identifier of a recorded violation.
    ViolationId
);
uuid_id!(
    /// Identifier of a mutation-gate record.
    GateId
);
uuid_id!(
    /// Identifier of an attestation.
    AttestationId
);

/// Governance role capabilities.
///
/// The four reviewer roles map one-to-one onto the mutation-gate stages;
/// `OverrideOperator` is the access-guard override held by break-glass
/// operators (denied writes still log, but do not auto-escalate).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GovernanceRole {
    TechnicalReviewer,
    PolicyReviewer,
    IndependentAuditor,
    RatifyingAuthority,
    OverrideOperator,
}

impl GovernanceRole {
    /// Whether this role may sign off the given gate stage.
    pub fn can_approve_stage(&self, stage: GateStage) -> bool {
        stage.required_role() == *self
    }

    /// Whether this role may resolve violations and consume escalations.
    pub fn is_ratifying_authority(&self) -> bool {
        matches!(self, Self::RatifyingAuthority)
    }
}

impl std::fmt::Display for GovernanceRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TechnicalReviewer => write!(f, "technical-reviewer"),
            Self::PolicyReviewer => write!(f, "policy-reviewer"),
            Self::IndependentAuditor => write!(f, "independent-auditor"),
            Self::RatifyingAuthority => write!(f, "ratifying-authority"),
            Self::OverrideOperator => write!(f, "override-operator"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_stage_mapping() {
        assert!(GovernanceRole::TechnicalReviewer.can_approve_stage(GateStage::Technical));
        assert!(GovernanceRole::RatifyingAuthority.can_approve_stage(GateStage::Ratification));
        assert!(!GovernanceRole::TechnicalReviewer.can_approve_stage(GateStage::Ratification));
        assert!(!GovernanceRole::OverrideOperator.can_approve_stage(GateStage::Technical));
    }

    #[test]
    fn display_forms() {
        assert_eq!(GovernanceRole::IndependentAuditor.to_string(), "independent-auditor");
        assert_eq!(AgentId::new("agent-7").to_string(), "agent-7");
        assert_eq!(ChainId::new("gate-1").to_string(), "gate-1");
    }
}
