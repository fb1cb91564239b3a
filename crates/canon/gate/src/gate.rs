//! The mutation gate pipeline.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};

use canon_attest::AttestationService;
use canon_audit::AuditLog;
use canon_registry::Registry;
use canon_types::{
    AgentId, ChainId, EntityRef, GateId, GateStage, GateState, GovernanceRole, MutationAction,
    MutationGateRecord, StageSlot, TruthKey,
};

use crate::error::GateError;

/// The audit chain carrying one gate's full decision trail.
pub fn gate_chain(gate_id: GateId) -> ChainId {
    ChainId::new(format!("gate-{gate_id}"))
}

/// The four-stage mutation gate.
///
/// Stage transitions are read-modify-write under the store's exclusive
/// write lock: the first valid signature commits and a concurrent second
/// one is rejected as stale. State never changes except through the
/// allowed-transitions table.
pub struct MutationGate {
    registry: Arc<Registry>,
    attest: Arc<AttestationService>,
    audit: Arc<AuditLog>,
    records: RwLock<HashMap<GateId, MutationGateRecord>>,
}

impl MutationGate {
    pub fn new(
        registry: Arc<Registry>,
        attest: Arc<AttestationService>,
        audit: Arc<AuditLog>,
    ) -> Self {
        Self {
            registry,
            attest,
            audit,
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Open a gate for a proposed registry mutation, pending stage 1.
    pub fn propose(
        &self,
        action: MutationAction,
        key: TruthKey,
        requester: AgentId,
    ) -> Result<MutationGateRecord, GateError> {
        let record = MutationGateRecord::new(action, key, requester);
        self.audit.append(
            &gate_chain(record.gate_id),
            json!({
                "event": "proposed",
                "action": record.action.to_string(),
                "key": record.key.to_string(),
                "requester": record.requester.0,
                "version": record.version,
            }),
            &record.requester,
        )?;

        let mut records = self.records.write().map_err(|_| GateError::LockPoisoned)?;
        records.insert(record.gate_id, record.clone());
        info!(gate = %record.gate_id, key = %record.key, action = %record.action, "mutation proposed");
        Ok(record)
    }

    /// Open an emergency gate: stages 1-3 compress into one technical
    /// sign-off recorded across all three slots with shared evidence.
    ///
    /// Ratification is never compressed - stage 4 still demands the
    /// ratifying authority and a fresh attestation, and the record carries
    /// `emergency = true` so replay can tell the paths apart.
    pub fn propose_emergency(
        &self,
        action: MutationAction,
        key: TruthKey,
        requester: AgentId,
        technical_approver: AgentId,
        role: GovernanceRole,
        justification: serde_json::Value,
    ) -> Result<MutationGateRecord, GateError> {
        if role != GovernanceRole::TechnicalReviewer {
            return Err(GateError::WrongRole {
                stage: GateStage::Technical,
                required: GovernanceRole::TechnicalReviewer,
                got: role,
            });
        }

        let mut record = MutationGateRecord::new(action, key, requester);
        record.emergency = true;
        let now = Utc::now();
        for stage in [
            GateStage::Technical,
            GateStage::Policy,
            GateStage::IndependentAudit,
        ] {
            record.stages[stage.index()] = Some(StageSlot {
                stage,
                approver: technical_approver.clone(),
                role,
                evidence: justification.clone(),
                passed: true,
                recorded_at: now,
            });
        }
        record.state = GateState::Pending {
            stage: GateStage::Ratification,
        };

        self.audit.append(
            &gate_chain(record.gate_id),
            json!({
                "event": "emergency_proposed",
                "action": record.action.to_string(),
                "key": record.key.to_string(),
                "requester": record.requester.0,
                "compressed_stages": [1, 2, 3],
                "technical_approver": technical_approver.0,
                "justification": justification,
                "version": record.version,
            }),
            &record.requester,
        )?;

        warn!(
            gate = %record.gate_id,
            key = %record.key,
            "emergency mutation proposed; stages 1-3 compressed, ratification still required"
        );

        let mut records = self.records.write().map_err(|_| GateError::LockPoisoned)?;
        records.insert(record.gate_id, record.clone());
        Ok(record)
    }

    /// Record one stage sign-off.
    ///
    /// On a stage-4 pass the registry change is applied and the gate
    /// completes in the same transaction; any failure along the way aborts
    /// cleanly with no partial state.
    pub fn record_stage(
        &self,
        gate_id: GateId,
        stage: GateStage,
        approver: AgentId,
        role: GovernanceRole,
        evidence: serde_json::Value,
        passed: bool,
    ) -> Result<MutationGateRecord, GateError> {
        let mut records = self.records.write().map_err(|_| GateError::LockPoisoned)?;
        let stored = records
            .get(&gate_id)
            .ok_or(GateError::GateNotFound { gate_id })?;

        if stored.state.is_terminal() {
            return Err(GateError::TerminalState {
                gate_id,
                state: stored.state,
            });
        }
        let current = match stored.state {
            GateState::Pending { stage } => stage,
            GateState::Failed { stage } => {
                return Err(GateError::ResubmissionRequired { gate_id, stage })
            }
            // A transient `Passed` is never stored; observing one means a
            // concurrent transaction is mid-flight.
            GateState::Passed { stage } => {
                return Err(GateError::StaleTransition { gate_id, stage })
            }
            state => return Err(GateError::TerminalState { gate_id, state }),
        };
        if stage != current {
            // A filled, passed slot means someone else already advanced
            // this stage; anything else is an ordering violation.
            if stored.slot(stage).is_some_and(|s| s.passed) {
                return Err(GateError::StaleTransition { gate_id, stage });
            }
            return Err(GateError::StageOutOfOrder {
                gate_id,
                expected: current,
                got: stage,
            });
        }

        let required = stage.required_role();
        if role != required {
            return Err(GateError::WrongRole {
                stage,
                required,
                got: role,
            });
        }
        if stage == GateStage::IndependentAudit {
            let earlier = [GateStage::Technical, GateStage::Policy];
            if earlier
                .iter()
                .filter_map(|s| stored.slot(*s))
                .any(|slot| slot.approver == approver)
            {
                return Err(GateError::DistinctApproverRequired { stage, approver });
            }
        }
        if stage == GateStage::Ratification && passed {
            let entity = EntityRef::gate(gate_id);
            if !self.attest.approved_for(&entity, stored.version)? {
                return Err(GateError::AttestationRequired {
                    gate_id,
                    version: stored.version,
                });
            }
        }

        // All checks passed: build the post-transition record on a copy
        // and write it back only once every step has succeeded.
        let mut record = stored.clone();
        record.stages[stage.index()] = Some(StageSlot {
            stage,
            approver: approver.clone(),
            role,
            evidence: evidence.clone(),
            passed,
            recorded_at: Utc::now(),
        });

        let decided = if passed {
            GateState::Passed { stage }
        } else {
            GateState::Failed { stage }
        };
        Self::transition(&mut record, decided)?;

        // Apply the registry change before anything is journaled so a
        // rejected application aborts the whole transaction cleanly.
        let applied = if passed && stage == GateStage::Ratification {
            Some(self.registry.apply_mutation(&record)?)
        } else {
            None
        };

        self.audit.append(
            &gate_chain(gate_id),
            json!({
                "event": "stage_recorded",
                "stage": stage.number(),
                "approver": approver.0,
                "role": role.to_string(),
                "passed": passed,
                "evidence": evidence,
                "version": record.version,
            }),
            &approver,
        )?;

        if passed {
            match stage.next() {
                Some(next) => {
                    Self::transition(&mut record, GateState::Pending { stage: next })?;
                    info!(gate = %gate_id, %stage, "stage passed, next stage open");
                }
                None => {
                    // The registry re-validated the record above; all that
                    // remains is sealing the trail.
                    let applied = applied.ok_or(GateError::InvalidTransition {
                        from: record.state,
                        to: GateState::Completed,
                    })?;
                    Self::transition(&mut record, GateState::Completed)?;
                    record.decided_at = Some(Utc::now());
                    self.audit.append(
                        &gate_chain(gate_id),
                        json!({
                            "event": "completed",
                            "action": record.action.to_string(),
                            "key": record.key.to_string(),
                            "store": applied.store.0,
                            "entry_status": format!("{:?}", applied.status),
                        }),
                        &approver,
                    )?;
                    info!(gate = %gate_id, key = %record.key, "mutation gate completed, registry change applied");
                }
            }
        } else {
            warn!(gate = %gate_id, %stage, "stage failed, mutation halted");
        }

        records.insert(gate_id, record.clone());
        Ok(record)
    }

    /// Reopen a failed stage. Resubmission restarts from that stage, not
    /// from scratch, and bumps the record version so any prior attestation
    /// no longer carries.
    pub fn resubmit_stage(&self, gate_id: GateId, requester: &AgentId) -> Result<MutationGateRecord, GateError> {
        let mut records = self.records.write().map_err(|_| GateError::LockPoisoned)?;
        let stored = records
            .get(&gate_id)
            .ok_or(GateError::GateNotFound { gate_id })?;

        let GateState::Failed { stage } = stored.state else {
            return Err(GateError::InvalidTransition {
                from: stored.state,
                to: GateState::Pending {
                    stage: GateStage::Technical,
                },
            });
        };
        if *requester != stored.requester {
            return Err(GateError::NotRequester {
                gate_id,
                agent: requester.clone(),
            });
        }

        let mut record = stored.clone();
        Self::transition(&mut record, GateState::Pending { stage })?;
        record.stages[stage.index()] = None;
        record.version += 1;

        self.audit.append(
            &gate_chain(gate_id),
            json!({
                "event": "resubmitted",
                "stage": stage.number(),
                "version": record.version,
            }),
            requester,
        )?;

        records.insert(gate_id, record.clone());
        info!(gate = %gate_id, %stage, version = record.version, "failed stage resubmitted");
        Ok(record)
    }

    /// Withdraw a proposal. Requester-only; terminal.
    pub fn cancel(&self, gate_id: GateId, by: &AgentId) -> Result<MutationGateRecord, GateError> {
        let mut records = self.records.write().map_err(|_| GateError::LockPoisoned)?;
        let stored = records
            .get(&gate_id)
            .ok_or(GateError::GateNotFound { gate_id })?;
        if *by != stored.requester {
            return Err(GateError::NotRequester {
                gate_id,
                agent: by.clone(),
            });
        }

        let mut record = stored.clone();
        Self::transition(&mut record, GateState::Cancelled)?;
        record.decided_at = Some(Utc::now());
        self.audit.append(
            &gate_chain(gate_id),
            json!({"event": "cancelled"}),
            by,
        )?;
        records.insert(gate_id, record.clone());
        Ok(record)
    }

    /// Reject a failed mutation outright. Ratifying-authority action;
    /// terminal.
    pub fn reject(
        &self,
        gate_id: GateId,
        by: &AgentId,
        role: GovernanceRole,
    ) -> Result<MutationGateRecord, GateError> {
        if !role.is_ratifying_authority() {
            return Err(GateError::AuthorityRequired { agent: by.clone() });
        }
        let mut records = self.records.write().map_err(|_| GateError::LockPoisoned)?;
        let stored = records
            .get(&gate_id)
            .ok_or(GateError::GateNotFound { gate_id })?;

        let mut record = stored.clone();
        Self::transition(&mut record, GateState::Rejected)?;
        record.decided_at = Some(Utc::now());
        self.audit.append(
            &gate_chain(gate_id),
            json!({"event": "rejected", "by": by.0}),
            by,
        )?;
        records.insert(gate_id, record.clone());
        Ok(record)
    }

    pub fn get(&self, gate_id: GateId) -> Result<Option<MutationGateRecord>, GateError> {
        let records = self.records.read().map_err(|_| GateError::LockPoisoned)?;
        Ok(records.get(&gate_id).cloned())
    }

    fn transition(record: &mut MutationGateRecord, to: GateState) -> Result<(), GateError> {
        if !record.state.can_transition(&to) {
            return Err(GateError::InvalidTransition {
                from: record.state,
                to,
            });
        }
        record.state = to;
        Ok(())
    }
}
