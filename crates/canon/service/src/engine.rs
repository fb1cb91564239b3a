//! Engine wiring.

use std::sync::Arc;

use tracing::info;

use canon_attest::{AttestationService, KeyCustody};
use canon_audit::{AuditLog, TamperSink};
use canon_gate::MutationGate;
use canon_guard::{AccessGuard, ViolationDetector, ViolationLog};
use canon_reconcile::Reconciler;
use canon_registry::Registry;
use canon_types::{StoreRef, TruthKey};

use crate::error::EngineError;

/// The fully wired canonical-truth engine.
pub struct CanonEngine {
    registry: Arc<Registry>,
    audit: Arc<AuditLog>,
    violations: Arc<ViolationLog>,
    attest: Arc<AttestationService>,
    guard: AccessGuard,
    detector: ViolationDetector,
    gate: MutationGate,
    reconciler: Reconciler,
}

impl CanonEngine {
    /// Wire an engine over the given key-custody collaborator.
    pub fn new(custody: Arc<dyn KeyCustody>) -> Result<Self, EngineError> {
        let registry = Arc::new(Registry::new());
        let audit = Arc::new(AuditLog::new());
        let violations = Arc::new(ViolationLog::new());
        // Intercepted audit mutations become tamper-attempt violations.
        let sink: Arc<dyn TamperSink> = violations.clone();
        audit.set_tamper_sink(sink)?;

        let attest = Arc::new(AttestationService::new(custody));
        let guard = AccessGuard::new(
            Arc::clone(&registry),
            Arc::clone(&violations),
            Arc::clone(&audit),
        );
        let detector = ViolationDetector::new(Arc::clone(&registry), Arc::clone(&violations));
        let gate = MutationGate::new(
            Arc::clone(&registry),
            Arc::clone(&attest),
            Arc::clone(&audit),
        );

        info!("canon engine wired");
        Ok(Self {
            registry,
            audit,
            violations,
            attest,
            guard,
            detector,
            gate,
            reconciler: Reconciler::new(),
        })
    }

    /// Scheduler-facing check: an ingestion job may only be registered
    /// against a domain that exists and is active. Returns the canonical
    /// store the job must target.
    pub fn register_job_target(&self, key: &TruthKey) -> Result<StoreRef, EngineError> {
        let store = self.registry.resolve(key)?;
        info!(key = %key, store = %store, "job target validated");
        Ok(store)
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn audit(&self) -> &Arc<AuditLog> {
        &self.audit
    }

    pub fn violations(&self) -> &Arc<ViolationLog> {
        &self.violations
    }

    pub fn attest(&self) -> &Arc<AttestationService> {
        &self.attest
    }

    pub fn guard(&self) -> &AccessGuard {
        &self.guard
    }

    pub fn detector(&self) -> &ViolationDetector {
        &self.detector
    }

    pub fn gate(&self) -> &MutationGate {
        &self.gate
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use canon_attest::MockKeyCustody;
    use canon_audit::AuditError;
    use canon_gate::gate_chain;
    use canon_guard::GuardError;
    use canon_types::{
        AccessContext, AgentId, AttestDecision, DataContract, DomainCategory, EntityRef,
        EntryStatus, GateStage, GateState, GovernanceRole, MutationAction, MutationGateRecord,
        OperationKind, ReconcileOutcome, Severity, ViolationKind,
    };
    use chrono::Utc;
    use serde_json::json;
    use std::collections::BTreeSet;

    fn engine() -> CanonEngine {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("canon=debug")
            .with_test_writer()
            .try_init();
        CanonEngine::new(Arc::new(MockKeyCustody::with_all_roles())).unwrap()
    }

    /// Drive a full four-stage gate for an action, distinct reviewers.
    fn run_gate(engine: &CanonEngine, action: MutationAction, key: TruthKey) -> MutationGateRecord {
        let record = engine
            .gate()
            .propose(action, key, AgentId::new("proposer"))
            .unwrap();
        for (stage, approver) in [
            (GateStage::Technical, "reviewer-a"),
            (GateStage::Policy, "reviewer-b"),
            (GateStage::IndependentAudit, "reviewer-c"),
        ] {
            engine
                .gate()
                .record_stage(
                    record.gate_id,
                    stage,
                    AgentId::new(approver),
                    stage.required_role(),
                    json!({"review": "pass"}),
                    true,
                )
                .unwrap();
        }
        engine
            .attest()
            .sign_and_attest(
                EntityRef::gate(record.gate_id),
                record.version,
                GovernanceRole::RatifyingAuthority,
                AttestDecision::Approved,
            )
            .unwrap();
        engine
            .gate()
            .record_stage(
                record.gate_id,
                GateStage::Ratification,
                AgentId::new("reviewer-d"),
                GovernanceRole::RatifyingAuthority,
                json!({"ratified": true}),
                true,
            )
            .unwrap()
    }

    fn activate_domain(engine: &CanonEngine, name: &str, store: &str) {
        engine
            .registry()
            .register(
                TruthKey::domain(name),
                DomainCategory::MarketData,
                DataContract::minimal(),
                StoreRef::new(store),
                BTreeSet::new(),
                BTreeSet::new(),
                AgentId::new("registrar"),
            )
            .unwrap();
        run_gate(engine, MutationAction::Register, TruthKey::domain(name));
    }

    #[test]
    fn production_ingestion_against_stale_store_is_denied_end_to_end() {
        let engine = engine();
        activate_domain(&engine, "prices", "prices_v1");

        let err = engine
            .guard()
            .validate_access(
                &AgentId::new("ingestion-job"),
                &TruthKey::domain("prices"),
                &StoreRef::new("prices_v2"),
                OperationKind::Write,
                AccessContext::Production,
            )
            .unwrap_err();

        let GuardError::AccessDenied { violation_id, .. } = err else {
            panic!("expected denial, got {err:?}");
        };
        let violation = engine.violations().get(violation_id).unwrap().unwrap();
        assert_eq!(violation.kind, ViolationKind::UnauthorizedAccess);
        assert_eq!(violation.severity, Severity::Major);
        assert_eq!(
            violation.evidence.conflicting_stores,
            vec![StoreRef::new("prices_v2"), StoreRef::new("prices_v1")]
        );
        // Major violations land on the authority's escalation queue.
        let escalations = engine.violations().drain_escalations().unwrap();
        assert_eq!(escalations.len(), 1);
        assert_eq!(escalations[0].violation_id, violation_id);
    }

    #[test]
    fn four_distinct_reviewers_deactivate_a_domain() {
        let engine = engine();
        activate_domain(&engine, "prices", "prices_v1");

        let record = run_gate(&engine, MutationAction::Deactivate, TruthKey::domain("prices"));
        assert_eq!(record.state, GateState::Completed);

        // The domain no longer resolves, its history survives.
        assert!(engine.register_job_target(&TruthKey::domain("prices")).is_err());
        let history = engine.registry().history(&TruthKey::domain("prices")).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, EntryStatus::Inactive);

        // The final audit entry chains off the stage-4 evidence entry.
        let entries = engine.audit().entries(&gate_chain(record.gate_id)).unwrap();
        let stage4 = &entries[entries.len() - 2];
        let last = entries.last().unwrap();
        assert_eq!(stage4.payload["stage"], 4);
        assert_eq!(last.payload["event"], "completed");
        assert_eq!(last.prev_hash.as_deref(), Some(stage4.self_hash.as_str()));
        assert!(engine
            .audit()
            .verify(&gate_chain(record.gate_id))
            .unwrap()
            .is_intact());
    }

    #[test]
    fn audit_tamper_attempt_hard_fails_and_records_violation() {
        let engine = engine();
        activate_domain(&engine, "prices", "prices_v1");
        let record = run_gate(&engine, MutationAction::Deactivate, TruthKey::domain("prices"));
        let chain = gate_chain(record.gate_id);

        let err = engine
            .audit()
            .try_mutate(&chain, 0, &AgentId::new("rogue-agent"), json!({"forged": true}))
            .unwrap_err();
        assert!(matches!(err, AuditError::ImmutableWriteAttempt { .. }));

        let tampering: Vec<_> = engine
            .violations()
            .all()
            .unwrap()
            .into_iter()
            .filter(|v| v.kind == ViolationKind::TamperAttempt)
            .collect();
        assert_eq!(tampering.len(), 1);
        assert_eq!(tampering[0].severity, Severity::Critical);
        // The chain itself is untouched.
        assert!(engine.audit().verify(&chain).unwrap().is_intact());
    }

    #[test]
    fn job_registration_checks_domain_is_active() {
        let engine = engine();

        // Unknown domain: hard failure.
        assert!(engine.register_job_target(&TruthKey::domain("prices")).is_err());

        // Draft is not enough.
        engine
            .registry()
            .register(
                TruthKey::domain("prices"),
                DomainCategory::MarketData,
                DataContract::minimal(),
                StoreRef::new("prices_v1"),
                BTreeSet::new(),
                BTreeSet::new(),
                AgentId::new("registrar"),
            )
            .unwrap();
        assert!(engine.register_job_target(&TruthKey::domain("prices")).is_err());

        run_gate(&engine, MutationAction::Register, TruthKey::domain("prices"));
        assert_eq!(
            engine.register_job_target(&TruthKey::domain("prices")).unwrap(),
            StoreRef::new("prices_v1")
        );
    }

    #[test]
    fn divergent_component_raises_suspension_through_engine() {
        let engine = engine();
        let snapshot = engine
            .reconciler()
            .reconcile(
                "execution-agent",
                json!({"position": 85.0}),
                json!({"position": 100.0}),
                0.10,
                Utc::now(),
            )
            .unwrap();
        assert_eq!(snapshot.outcome, ReconcileOutcome::Divergent);
        assert_eq!(engine.reconciler().drain_suspensions().unwrap().len(), 1);
    }

    #[test]
    fn multi_truth_scan_is_clean_after_gated_activation() {
        let engine = engine();
        activate_domain(&engine, "prices", "prices_v1");
        assert!(engine
            .detector()
            .detect_multi_truth(&TruthKey::domain("prices"))
            .unwrap()
            .is_none());
    }
}
