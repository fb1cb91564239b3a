//! The registry store.

use std::collections::{BTreeSet, HashMap};
use std::sync::RwLock;

use chrono::Utc;
use tracing::info;

use canon_types::{
    AgentId, DataContract, DomainCategory, EntryStatus, GateStage, GateState, MutationAction,
    MutationGateRecord, RegistryEntry, RoleId, StoreRef, TruthKey,
};

use crate::error::RegistryError;

/// One-active-truth-per-key registry over domains, series, and indicator
/// definitions.
///
/// The full entry history per key is retained; status flips, never deletes.
/// Registry entries are exclusively owned by the mutation gate that created
/// them: nothing outside [`Registry::apply_mutation`] can touch `status`.
pub struct Registry {
    entries: RwLock<HashMap<TruthKey, Vec<RegistryEntry>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Register a draft entry for a key.
    ///
    /// Fails with [`RegistryError::UniquenessViolation`] if a draft or
    /// active entry already claims the key - the write lock makes exactly
    /// one of N simultaneous registrations commit. The contract is
    /// validated against the category's enumerated option set here, at
    /// registration time.
    pub fn register(
        &self,
        key: TruthKey,
        category: DomainCategory,
        contract: DataContract,
        store: StoreRef,
        read_roles: BTreeSet<RoleId>,
        write_roles: BTreeSet<RoleId>,
        registered_by: AgentId,
    ) -> Result<RegistryEntry, RegistryError> {
        contract.validate_for(category)?;

        let mut entries = self.entries.write().map_err(|_| RegistryError::LockPoisoned)?;
        let history = entries.entry(key.clone()).or_default();

        if let Some(existing) = history
            .iter()
            .find(|e| matches!(e.status, EntryStatus::Draft | EntryStatus::Active))
        {
            return Err(RegistryError::UniquenessViolation {
                key,
                existing_store: existing.store.clone(),
            });
        }

        let now = Utc::now();
        let entry = RegistryEntry {
            key: key.clone(),
            category,
            store,
            contract,
            read_roles,
            write_roles,
            status: EntryStatus::Draft,
            registered_by,
            created_at: now,
            updated_at: now,
        };
        history.push(entry.clone());

        info!(key = %key, store = %entry.store, "draft entry registered, awaiting mutation gate");
        Ok(entry)
    }

    /// Resolve the active canonical store for a key.
    ///
    /// This is the only sanctioned truth-discovery path; no component may
    /// hardcode a store location.
    pub fn resolve(&self, key: &TruthKey) -> Result<StoreRef, RegistryError> {
        let entries = self.entries.read().map_err(|_| RegistryError::LockPoisoned)?;
        entries
            .get(key)
            .and_then(|history| history.iter().find(|e| e.status == EntryStatus::Active))
            .map(|e| e.store.clone())
            .ok_or_else(|| RegistryError::UnresolvedKey { key: key.clone() })
    }

    /// Count of active entries for a key. Anything above one is a bug
    /// state for the violation detector to flag.
    pub fn active_count(&self, key: &TruthKey) -> Result<usize, RegistryError> {
        let entries = self.entries.read().map_err(|_| RegistryError::LockPoisoned)?;
        Ok(entries
            .get(key)
            .map(|history| {
                history
                    .iter()
                    .filter(|e| e.status == EntryStatus::Active)
                    .count()
            })
            .unwrap_or(0))
    }

    /// Full entry history for a key, in registration order.
    pub fn history(&self, key: &TruthKey) -> Result<Vec<RegistryEntry>, RegistryError> {
        let entries = self.entries.read().map_err(|_| RegistryError::LockPoisoned)?;
        Ok(entries.get(key).cloned().unwrap_or_default())
    }

    /// Apply the registry change a fully passed mutation gate authorizes.
    ///
    /// The gate record must be in `Passed(Ratification)` with all four
    /// stage slots passed; anything else is rejected. The read-modify-write
    /// runs under the write lock, re-checking uniqueness at activation.
    pub fn apply_mutation(
        &self,
        gate: &MutationGateRecord,
    ) -> Result<RegistryEntry, RegistryError> {
        let authorized = gate.state
            == GateState::Passed {
                stage: GateStage::Ratification,
            }
            && gate.all_stages_passed();
        if !authorized {
            return Err(RegistryError::GateIncomplete {
                gate_id: gate.gate_id,
                state: gate.state,
            });
        }

        let mut entries = self.entries.write().map_err(|_| RegistryError::LockPoisoned)?;
        let Some(history) = entries.get_mut(&gate.key) else {
            return Err(match gate.action {
                MutationAction::Register => RegistryError::DraftNotFound {
                    key: gate.key.clone(),
                },
                _ => RegistryError::UnresolvedKey {
                    key: gate.key.clone(),
                },
            });
        };

        let now = Utc::now();
        let updated = match &gate.action {
            MutationAction::Register => {
                if let Some(active) = history.iter().find(|e| e.status == EntryStatus::Active) {
                    return Err(RegistryError::UniquenessViolation {
                        key: gate.key.clone(),
                        existing_store: active.store.clone(),
                    });
                }
                let draft = history
                    .iter_mut()
                    .find(|e| e.status == EntryStatus::Draft)
                    .ok_or_else(|| RegistryError::DraftNotFound {
                        key: gate.key.clone(),
                    })?;
                draft.status = EntryStatus::Active;
                draft.updated_at = now;
                draft.clone()
            }
            MutationAction::Deactivate => {
                let active = history
                    .iter_mut()
                    .find(|e| e.status == EntryStatus::Active)
                    .ok_or_else(|| RegistryError::UnresolvedKey {
                        key: gate.key.clone(),
                    })?;
                active.status = EntryStatus::Inactive;
                active.updated_at = now;
                active.clone()
            }
            MutationAction::AmendContract { contract } => {
                let active = history
                    .iter_mut()
                    .find(|e| e.status == EntryStatus::Active)
                    .ok_or_else(|| RegistryError::UnresolvedKey {
                        key: gate.key.clone(),
                    })?;
                contract.validate_for(active.category)?;
                active.contract = contract.clone();
                active.updated_at = now;
                active.clone()
            }
        };

        info!(
            key = %gate.key,
            action = %gate.action,
            gate = %gate.gate_id,
            status = ?updated.status,
            "registry mutation applied"
        );
        Ok(updated)
    }

    /// Insert an entry bypassing uniqueness, for invariant-bypass tests
    /// only.
    #[doc(hidden)]
    pub fn insert_entry_unchecked(&self, entry: RegistryEntry) -> Result<(), RegistryError> {
        let mut entries = self.entries.write().map_err(|_| RegistryError::LockPoisoned)?;
        entries.entry(entry.key.clone()).or_default().push(entry);
        Ok(())
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canon_types::{GovernanceRole, StageSlot};
    use std::sync::Arc;

    fn register_draft(registry: &Registry, key: &TruthKey, store: &str) -> Result<RegistryEntry, RegistryError> {
        registry.register(
            key.clone(),
            DomainCategory::MarketData,
            DataContract::minimal(),
            StoreRef::new(store),
            BTreeSet::new(),
            BTreeSet::new(),
            AgentId::new("registrar"),
        )
    }

    fn passed_gate(action: MutationAction, key: TruthKey) -> MutationGateRecord {
        let mut record = MutationGateRecord::new(action, key, AgentId::new("proposer"));
        for (i, stage) in GateStage::ALL.into_iter().enumerate() {
            record.stages[i] = Some(StageSlot {
                stage,
                approver: AgentId::new(format!("approver-{i}")),
                role: stage.required_role(),
                evidence: serde_json::Value::Null,
                passed: true,
                recorded_at: Utc::now(),
            });
        }
        record.state = GateState::Passed {
            stage: GateStage::Ratification,
        };
        record
    }

    #[test]
    fn register_resolve_lifecycle() {
        let registry = Registry::new();
        let key = TruthKey::domain("prices");

        register_draft(&registry, &key, "prices_v1").unwrap();
        // Draft entries do not resolve.
        assert!(matches!(
            registry.resolve(&key),
            Err(RegistryError::UnresolvedKey { .. })
        ));

        registry
            .apply_mutation(&passed_gate(MutationAction::Register, key.clone()))
            .unwrap();
        assert_eq!(registry.resolve(&key).unwrap(), StoreRef::new("prices_v1"));
        assert_eq!(registry.active_count(&key).unwrap(), 1);
    }

    #[test]
    fn resolve_is_idempotent_without_mutation() {
        let registry = Registry::new();
        let key = TruthKey::domain("prices");
        register_draft(&registry, &key, "prices_v1").unwrap();
        registry
            .apply_mutation(&passed_gate(MutationAction::Register, key.clone()))
            .unwrap();

        let first = registry.resolve(&key).unwrap();
        let second = registry.resolve(&key).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn duplicate_registration_rejected() {
        let registry = Registry::new();
        let key = TruthKey::domain("prices");
        register_draft(&registry, &key, "prices_v1").unwrap();

        let err = register_draft(&registry, &key, "prices_v2").unwrap_err();
        assert_eq!(
            err,
            RegistryError::UniquenessViolation {
                key,
                existing_store: StoreRef::new("prices_v1"),
            }
        );
    }

    #[test]
    fn concurrent_registrations_admit_exactly_one() {
        let registry = Arc::new(Registry::new());
        let key = TruthKey::domain("prices");

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let registry = Arc::clone(&registry);
                let key = key.clone();
                std::thread::spawn(move || {
                    register_draft(&registry, &key, &format!("prices_v{i}")).is_ok()
                })
            })
            .collect();

        let wins = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&ok| ok)
            .count();
        assert_eq!(wins, 1);
    }

    #[test]
    fn invalid_contract_rejected_at_registration() {
        let registry = Registry::new();
        let err = registry
            .register(
                TruthKey::domain("decisions"),
                DomainCategory::Decisions,
                DataContract::new(1, vec![canon_types::ContractOption::SurvivorshipBiasFree]),
                StoreRef::new("decisions_v1"),
                BTreeSet::new(),
                BTreeSet::new(),
                AgentId::new("registrar"),
            )
            .unwrap_err();
        assert!(matches!(err, RegistryError::InvalidContract(_)));
    }

    #[test]
    fn incomplete_gate_cannot_mutate() {
        let registry = Registry::new();
        let key = TruthKey::domain("prices");
        register_draft(&registry, &key, "prices_v1").unwrap();

        let mut gate = passed_gate(MutationAction::Register, key.clone());
        gate.state = GateState::Pending {
            stage: GateStage::Ratification,
        };
        assert!(matches!(
            registry.apply_mutation(&gate).unwrap_err(),
            RegistryError::GateIncomplete { .. }
        ));

        // All-passed slots alone are not enough either.
        let mut gate = passed_gate(MutationAction::Register, key);
        gate.stages[2] = None;
        gate.state = GateState::Passed {
            stage: GateStage::Ratification,
        };
        assert!(matches!(
            registry.apply_mutation(&gate).unwrap_err(),
            RegistryError::GateIncomplete { .. }
        ));
    }

    #[test]
    fn deactivate_flips_status_and_reregistration_opens() {
        let registry = Registry::new();
        let key = TruthKey::domain("prices");
        register_draft(&registry, &key, "prices_v1").unwrap();
        registry
            .apply_mutation(&passed_gate(MutationAction::Register, key.clone()))
            .unwrap();

        registry
            .apply_mutation(&passed_gate(MutationAction::Deactivate, key.clone()))
            .unwrap();
        assert!(matches!(
            registry.resolve(&key),
            Err(RegistryError::UnresolvedKey { .. })
        ));
        // History is retained, nothing was deleted.
        assert_eq!(registry.history(&key).unwrap().len(), 1);

        // The key is reclaimable once inactive.
        register_draft(&registry, &key, "prices_v2").unwrap();
        assert_eq!(registry.history(&key).unwrap().len(), 2);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// However registrations interleave across a handful of keys,
            /// no key ever carries more than one draft-or-active entry,
            /// and every loser sees a uniqueness violation.
            #[test]
            fn at_most_one_claim_per_key(attempts in proptest::collection::vec((0usize..3, 0u8..8), 1..40)) {
                let registry = Registry::new();
                let keys = [
                    TruthKey::domain("prices"),
                    TruthKey::domain("signals"),
                    TruthKey::domain("fills"),
                ];
                for (key_index, store_index) in attempts {
                    let key = &keys[key_index];
                    match register_draft(&registry, key, &format!("store_v{store_index}")) {
                        Ok(_) => {}
                        Err(RegistryError::UniquenessViolation { .. }) => {}
                        Err(other) => return Err(TestCaseError::fail(format!("{other}"))),
                    }
                }
                for key in &keys {
                    let claims = registry
                        .history(key)
                        .unwrap()
                        .into_iter()
                        .filter(|e| matches!(e.status, EntryStatus::Draft | EntryStatus::Active))
                        .count();
                    prop_assert!(claims <= 1);
                }
            }
        }
    }

    #[test]
    fn amend_contract_on_active_entry() {
        let registry = Registry::new();
        let key = TruthKey::domain("prices");
        register_draft(&registry, &key, "prices_v1").unwrap();
        registry
            .apply_mutation(&passed_gate(MutationAction::Register, key.clone()))
            .unwrap();

        let amended = DataContract::new(2, vec![canon_types::ContractOption::PointInTime]);
        let updated = registry
            .apply_mutation(&passed_gate(
                MutationAction::AmendContract {
                    contract: amended.clone(),
                },
                key,
            ))
            .unwrap();
        assert_eq!(updated.contract, amended);
    }
}
