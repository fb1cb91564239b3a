//! The external key-custody seam.

use std::collections::HashSet;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use canon_types::{AttestDecision, EntityRef, GovernanceRole};

/// Canonical bytes a role signs when attesting an entity version.
pub fn signing_payload(entity: &EntityRef, version: u32, decision: AttestDecision) -> Vec<u8> {
    let decision = match decision {
        AttestDecision::Approved => "approved",
        AttestDecision::Rejected => "rejected",
    };
    format!("{entity}|v{version}|{decision}").into_bytes()
}

/// Per-role signing credentials, issued and rotated by an external
/// key-management collaborator. The engine consumes signatures; it never
/// generates or rotates keys.
pub trait KeyCustody: Send + Sync {
    fn sign(&self, payload: &[u8], role: GovernanceRole) -> Vec<u8>;

    fn verify(&self, payload: &[u8], signature: &[u8], role: GovernanceRole) -> bool;

    fn is_key_valid(&self, role: GovernanceRole, at_time: DateTime<Utc>) -> bool;
}

/// Deterministic custody stub for tests and local wiring.
///
/// Signatures are `SHA256(role || payload)`; validity is a revocable
/// per-role grant set. No asymmetric cryptography - the real collaborator
/// supplies that.
pub struct MockKeyCustody {
    valid_roles: RwLock<HashSet<GovernanceRole>>,
}

impl MockKeyCustody {
    /// Custody with every governance role granted a valid credential.
    pub fn with_all_roles() -> Self {
        let all = [
            GovernanceRole::TechnicalReviewer,
            GovernanceRole::PolicyReviewer,
            GovernanceRole::IndependentAuditor,
            GovernanceRole::RatifyingAuthority,
            GovernanceRole::OverrideOperator,
        ];
        Self {
            valid_roles: RwLock::new(all.into_iter().collect()),
        }
    }

    /// Revoke a role's credential.
    pub fn revoke(&self, role: GovernanceRole) {
        if let Ok(mut roles) = self.valid_roles.write() {
            roles.remove(&role);
        }
    }

    fn digest(payload: &[u8], role: GovernanceRole) -> Vec<u8> {
        let mut hasher = Sha256::new();
        hasher.update(role.to_string().as_bytes());
        hasher.update(payload);
        hex::encode(hasher.finalize()).into_bytes()
    }
}

impl KeyCustody for MockKeyCustody {
    fn sign(&self, payload: &[u8], role: GovernanceRole) -> Vec<u8> {
        Self::digest(payload, role)
    }

    fn verify(&self, payload: &[u8], signature: &[u8], role: GovernanceRole) -> bool {
        Self::digest(payload, role) == signature
    }

    fn is_key_valid(&self, role: GovernanceRole, _at_time: DateTime<Utc>) -> bool {
        self.valid_roles
            .read()
            .map(|roles| roles.contains(&role))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canon_types::GateId;

    #[test]
    fn sign_then_verify_round_trips() {
        let custody = MockKeyCustody::with_all_roles();
        let payload = signing_payload(
            &EntityRef::gate(GateId::generate()),
            1,
            AttestDecision::Approved,
        );
        let signature = custody.sign(&payload, GovernanceRole::RatifyingAuthority);
        assert!(custody.verify(&payload, &signature, GovernanceRole::RatifyingAuthority));
        // A different role's credential never verifies the same payload.
        assert!(!custody.verify(&payload, &signature, GovernanceRole::PolicyReviewer));
    }

    #[test]
    fn revoked_role_is_invalid() {
        let custody = MockKeyCustody::with_all_roles();
        assert!(custody.is_key_valid(GovernanceRole::IndependentAuditor, Utc::now()));
        custody.revoke(GovernanceRole::IndependentAuditor);
        assert!(!custody.is_key_valid(GovernanceRole::IndependentAuditor, Utc::now()));
    }

    #[test]
    fn payload_is_version_scoped() {
        let entity = EntityRef::gate(GateId::generate());
        assert_ne!(
            signing_payload(&entity, 1, AttestDecision::Approved),
            signing_payload(&entity, 2, AttestDecision::Approved)
        );
    }
}
