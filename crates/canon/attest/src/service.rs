//! Attestation recording and lookup.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use tracing::info;

use canon_types::{AttestDecision, Attestation, AttestationId, EntityRef, GovernanceRole};

use crate::custody::{signing_payload, KeyCustody};
use crate::error::AttestError;

/// Records role-signed approvals per (entity, version).
///
/// An entity requiring activation stays non-canonical until an
/// attestation with decision `Approved` exists for its specific version.
pub struct AttestationService {
    custody: Arc<dyn KeyCustody>,
    attestations: RwLock<HashMap<(EntityRef, u32), Vec<Attestation>>>,
}

impl AttestationService {
    pub fn new(custody: Arc<dyn KeyCustody>) -> Self {
        Self {
            custody,
            attestations: RwLock::new(HashMap::new()),
        }
    }

    /// Record an attestation.
    ///
    /// Requires the role to hold a currently valid signing credential and
    /// the signature to verify against the canonical payload for exactly
    /// this (entity, version, decision).
    pub fn attest(
        &self,
        entity: EntityRef,
        version: u32,
        role: GovernanceRole,
        signature: Vec<u8>,
        decision: AttestDecision,
    ) -> Result<Attestation, AttestError> {
        if !self.custody.is_key_valid(role, Utc::now()) {
            return Err(AttestError::KeyInvalid { role });
        }
        let payload = signing_payload(&entity, version, decision);
        if !self.custody.verify(&payload, &signature, role) {
            return Err(AttestError::SignatureInvalid { role });
        }

        let attestation = Attestation {
            attestation_id: AttestationId::generate(),
            entity: entity.clone(),
            version,
            role,
            signature,
            decision,
            attested_at: Utc::now(),
        };

        let mut store = self
            .attestations
            .write()
            .map_err(|_| AttestError::LockPoisoned)?;
        store
            .entry((entity.clone(), version))
            .or_default()
            .push(attestation.clone());

        info!(entity = %entity, version, role = %role, ?decision, "attestation recorded");
        Ok(attestation)
    }

    /// Sign with custody and record in one step.
    pub fn sign_and_attest(
        &self,
        entity: EntityRef,
        version: u32,
        role: GovernanceRole,
        decision: AttestDecision,
    ) -> Result<Attestation, AttestError> {
        let signature = self
            .custody
            .sign(&signing_payload(&entity, version, decision), role);
        self.attest(entity, version, role, signature, decision)
    }

    /// Whether an `Approved` attestation exists for exactly this version.
    /// Attestations for other versions never carry forward.
    pub fn approved_for(&self, entity: &EntityRef, version: u32) -> Result<bool, AttestError> {
        let store = self
            .attestations
            .read()
            .map_err(|_| AttestError::LockPoisoned)?;
        Ok(store
            .get(&(entity.clone(), version))
            .is_some_and(|list| list.iter().any(|a| a.decision == AttestDecision::Approved)))
    }

    /// All attestations recorded for one (entity, version).
    pub fn attestations_for(
        &self,
        entity: &EntityRef,
        version: u32,
    ) -> Result<Vec<Attestation>, AttestError> {
        let store = self
            .attestations
            .read()
            .map_err(|_| AttestError::LockPoisoned)?;
        Ok(store.get(&(entity.clone(), version)).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::custody::MockKeyCustody;
    use canon_types::GateId;

    fn service() -> AttestationService {
        AttestationService::new(Arc::new(MockKeyCustody::with_all_roles()))
    }

    #[test]
    fn attest_and_query() {
        let service = service();
        let entity = EntityRef::gate(GateId::generate());

        assert!(!service.approved_for(&entity, 1).unwrap());
        service
            .sign_and_attest(
                entity.clone(),
                1,
                GovernanceRole::RatifyingAuthority,
                AttestDecision::Approved,
            )
            .unwrap();
        assert!(service.approved_for(&entity, 1).unwrap());
        assert_eq!(service.attestations_for(&entity, 1).unwrap().len(), 1);
    }

    #[test]
    fn approval_never_carries_across_versions() {
        let service = service();
        let entity = EntityRef::gate(GateId::generate());
        service
            .sign_and_attest(
                entity.clone(),
                1,
                GovernanceRole::RatifyingAuthority,
                AttestDecision::Approved,
            )
            .unwrap();

        assert!(service.approved_for(&entity, 1).unwrap());
        assert!(!service.approved_for(&entity, 2).unwrap());
    }

    #[test]
    fn rejection_is_not_approval() {
        let service = service();
        let entity = EntityRef::gate(GateId::generate());
        service
            .sign_and_attest(
                entity.clone(),
                1,
                GovernanceRole::RatifyingAuthority,
                AttestDecision::Rejected,
            )
            .unwrap();
        assert!(!service.approved_for(&entity, 1).unwrap());
    }

    #[test]
    fn revoked_key_is_rejected() {
        let custody = Arc::new(MockKeyCustody::with_all_roles());
        custody.revoke(GovernanceRole::RatifyingAuthority);
        let service = AttestationService::new(custody);

        let entity = EntityRef::gate(GateId::generate());
        let err = service
            .sign_and_attest(
                entity,
                1,
                GovernanceRole::RatifyingAuthority,
                AttestDecision::Approved,
            )
            .unwrap_err();
        assert_eq!(
            err,
            AttestError::KeyInvalid {
                role: GovernanceRole::RatifyingAuthority
            }
        );
    }

    #[test]
    fn bad_signature_is_rejected() {
        let service = service();
        let entity = EntityRef::gate(GateId::generate());
        let err = service
            .attest(
                entity,
                1,
                GovernanceRole::PolicyReviewer,
                b"not-a-signature".to_vec(),
                AttestDecision::Approved,
            )
            .unwrap_err();
        assert_eq!(
            err,
            AttestError::SignatureInvalid {
                role: GovernanceRole::PolicyReviewer
            }
        );
    }
}
