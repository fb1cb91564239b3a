//! The access guard.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use serde_json::json;
use tracing::{debug, warn};

use canon_audit::AuditLog;
use canon_registry::{Registry, RegistryError};
use canon_types::{
    AccessContext, AccessRecord, AgentId, ChainId, OperationKind, Severity, StoreRef, TruthKey,
    ViolationEvidence, ViolationKind,
};

use crate::error::GuardError;
use crate::violations::ViolationLog;

/// Audit chain receiving access denials.
pub const ACCESS_CHAIN: &str = "access";

/// Validates every read/write request against the registry.
///
/// Fail-closed: when canonical resolution cannot be completed the request
/// is denied rather than allowed through. Every call appends an immutable
/// [`AccessRecord`], allowed or denied.
pub struct AccessGuard {
    registry: Arc<Registry>,
    violations: Arc<ViolationLog>,
    audit: Arc<AuditLog>,
    access_log: RwLock<Vec<AccessRecord>>,
    override_agents: RwLock<HashSet<AgentId>>,
}

impl AccessGuard {
    pub fn new(registry: Arc<Registry>, violations: Arc<ViolationLog>, audit: Arc<AuditLog>) -> Self {
        Self {
            registry,
            violations,
            audit,
            access_log: RwLock::new(Vec::new()),
            override_agents: RwLock::new(HashSet::new()),
        }
    }

    /// Grant an agent the break-glass override: denials still log, but do
    /// not auto-escalate.
    pub fn grant_override(&self, agent: AgentId) -> Result<(), GuardError> {
        let mut agents = self
            .override_agents
            .write()
            .map_err(|_| GuardError::LockPoisoned)?;
        agents.insert(agent);
        Ok(())
    }

    /// Validate one access request.
    ///
    /// Resolution goes through the registry - the single sanctioned
    /// truth-discovery path. In production, a target other than the
    /// canonical store is denied and recorded as an unauthorized-access
    /// violation with both conflicting stores as evidence. Outside
    /// production a non-canonical target passes but leaves a minor
    /// violation for manual review.
    pub fn validate_access(
        &self,
        agent: &AgentId,
        key: &TruthKey,
        target_store: &StoreRef,
        operation: OperationKind,
        context: AccessContext,
    ) -> Result<AccessRecord, GuardError> {
        let canonical = match self.registry.resolve(key) {
            Ok(store) => store,
            Err(err @ RegistryError::UnresolvedKey { .. }) => {
                // Fail closed: no canonical entry means no access.
                self.log_access(
                    agent,
                    operation,
                    key,
                    target_store,
                    context,
                    false,
                    Some("no active canonical entry".into()),
                )?;
                return Err(err.into());
            }
            Err(err) => return Err(err.into()),
        };

        if *target_store == canonical {
            debug!(agent = %agent, key = %key, store = %target_store, "access allowed");
            return self.log_access(agent, operation, key, target_store, context, true, None);
        }

        if context.is_production() {
            let has_override = self
                .override_agents
                .read()
                .map_err(|_| GuardError::LockPoisoned)?
                .contains(agent);

            let evidence = ViolationEvidence {
                description: format!(
                    "production {operation:?} targeted '{target_store}' while canonical is '{canonical}'"
                ),
                key: Some(key.clone()),
                agent: Some(agent.clone()),
                conflicting_stores: vec![target_store.clone(), canonical.clone()],
            };
            let violation = if has_override {
                self.violations.record_without_escalation(
                    ViolationKind::UnauthorizedAccess,
                    Severity::Major,
                    evidence,
                )?
            } else {
                self.violations
                    .record(ViolationKind::UnauthorizedAccess, Severity::Major, evidence)?
            };

            warn!(
                agent = %agent,
                key = %key,
                target = %target_store,
                canonical = %canonical,
                "production access to non-canonical store denied"
            );
            self.log_access(
                agent,
                operation,
                key,
                target_store,
                context,
                false,
                Some(format!("canonical store is '{canonical}'")),
            )?;
            self.audit.append(
                &ChainId::new(ACCESS_CHAIN),
                json!({
                    "event": "access_denied",
                    "agent": agent.0,
                    "key": key.to_string(),
                    "target_store": target_store.0,
                    "canonical_store": canonical.0,
                    "violation_id": violation.violation_id.to_string(),
                }),
                agent,
            )?;

            return Err(GuardError::AccessDenied {
                agent: agent.clone(),
                key: key.clone(),
                target_store: target_store.clone(),
                canonical_store: canonical,
                violation_id: violation.violation_id,
            });
        }

        // Non-production divergence: allowed, but flagged for review.
        self.violations.record(
            ViolationKind::UnauthorizedAccess,
            Severity::Minor,
            ViolationEvidence {
                description: format!(
                    "{context:?} {operation:?} targeted '{target_store}' while canonical is '{canonical}'"
                ),
                key: Some(key.clone()),
                agent: Some(agent.clone()),
                conflicting_stores: vec![target_store.clone(), canonical.clone()],
            },
        )?;
        self.log_access(agent, operation, key, target_store, context, true, None)
    }

    /// Immutable access trail, in insertion order.
    pub fn access_records(&self) -> Result<Vec<AccessRecord>, GuardError> {
        let log = self.access_log.read().map_err(|_| GuardError::LockPoisoned)?;
        Ok(log.clone())
    }

    #[allow(clippy::too_many_arguments)]
    fn log_access(
        &self,
        agent: &AgentId,
        operation: OperationKind,
        key: &TruthKey,
        target_store: &StoreRef,
        context: AccessContext,
        authorized: bool,
        denial_reason: Option<String>,
    ) -> Result<AccessRecord, GuardError> {
        let record = AccessRecord {
            agent: agent.clone(),
            operation,
            key: key.clone(),
            target_store: target_store.clone(),
            context,
            authorized,
            denial_reason,
            recorded_at: Utc::now(),
        };
        let mut log = self.access_log.write().map_err(|_| GuardError::LockPoisoned)?;
        log.push(record.clone());
        Ok(record)
    }
}
