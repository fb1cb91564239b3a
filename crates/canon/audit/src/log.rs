//! The append-only audit store.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use tracing::{debug, warn};

use canon_types::{AgentId, AuditLogEntry, ChainId};

use crate::error::AuditError;
use crate::hash::entry_hash;

/// Receives intercepted mutation attempts so they can be recorded as
/// tamper-attempt violations. Wired to the violation log by the engine.
pub trait TamperSink: Send + Sync {
    fn tamper_attempt(&self, chain_id: &ChainId, seq: u64, agent: &AgentId);
}

/// Result of walking a chain end to end.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChainReport {
    Intact { length: u64 },
    Broken { first_bad_seq: u64 },
}

impl ChainReport {
    pub fn is_intact(&self) -> bool {
        matches!(self, Self::Intact { .. })
    }
}

/// Append-only, hash-chained audit log.
///
/// Entries for one chain live in a `Vec` indexed by sequence number, so
/// appends serialize on the chain tail and verification walks linearly.
pub struct AuditLog {
    chains: RwLock<HashMap<ChainId, Vec<AuditLogEntry>>>,
    tamper_sink: RwLock<Option<Arc<dyn TamperSink>>>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self {
            chains: RwLock::new(HashMap::new()),
            tamper_sink: RwLock::new(None),
        }
    }

    /// Wire the sink that converts intercepted mutations into violations.
    pub fn set_tamper_sink(&self, sink: Arc<dyn TamperSink>) -> Result<(), AuditError> {
        let mut slot = self
            .tamper_sink
            .write()
            .map_err(|_| AuditError::LockPoisoned)?;
        *slot = Some(sink);
        Ok(())
    }

    /// Append a record to a chain.
    ///
    /// The write lock serializes appends against the chain tail, so the
    /// `prev_hash` linkage is never claimed by two records. Different
    /// chains do not contend semantically; they share one map lock only
    /// as an implementation detail of the in-memory substrate.
    pub fn append(
        &self,
        chain_id: &ChainId,
        payload: serde_json::Value,
        agent: &AgentId,
    ) -> Result<AuditLogEntry, AuditError> {
        let mut chains = self.chains.write().map_err(|_| AuditError::LockPoisoned)?;
        let chain = chains.entry(chain_id.clone()).or_default();

        let prev_hash = chain.last().map(|tail| tail.self_hash.clone());
        let recorded_at = Utc::now();
        let self_hash = entry_hash(prev_hash.as_deref(), &payload, &recorded_at)?;

        let entry = AuditLogEntry {
            chain_id: chain_id.clone(),
            seq: chain.len() as u64,
            prev_hash,
            self_hash,
            payload,
            agent: agent.clone(),
            recorded_at,
        };
        chain.push(entry.clone());

        debug!(chain = %chain_id, seq = entry.seq, agent = %agent, "audit entry appended");
        Ok(entry)
    }

    /// Walk the chain from sequence 0, recomputing every hash.
    ///
    /// Reports the first sequence whose stored hash, linkage, or position
    /// disagrees with recomputation. An unknown chain is an empty, intact
    /// chain.
    pub fn verify(&self, chain_id: &ChainId) -> Result<ChainReport, AuditError> {
        let chains = self.chains.read().map_err(|_| AuditError::LockPoisoned)?;
        let Some(chain) = chains.get(chain_id) else {
            return Ok(ChainReport::Intact { length: 0 });
        };

        let mut expected_prev: Option<&str> = None;
        for (i, entry) in chain.iter().enumerate() {
            let broken = ChainReport::Broken {
                first_bad_seq: i as u64,
            };
            if entry.seq != i as u64 || entry.prev_hash.as_deref() != expected_prev {
                return Ok(broken);
            }
            let recomputed =
                entry_hash(entry.prev_hash.as_deref(), &entry.payload, &entry.recorded_at)?;
            if recomputed != entry.self_hash {
                return Ok(broken);
            }
            expected_prev = Some(entry.self_hash.as_str());
        }
        Ok(ChainReport::Intact {
            length: chain.len() as u64,
        })
    }

    /// Verify and fail hard on any break. Downstream consumers of a broken
    /// chain must stop; there is no auto-repair.
    pub fn require_intact(&self, chain_id: &ChainId) -> Result<u64, AuditError> {
        match self.verify(chain_id)? {
            ChainReport::Intact { length } => Ok(length),
            ChainReport::Broken { first_bad_seq } => Err(AuditError::ChainIntegrityFailure {
                chain_id: chain_id.clone(),
                first_bad_seq,
            }),
        }
    }

    /// All entries of a chain in sequence order.
    pub fn entries(&self, chain_id: &ChainId) -> Result<Vec<AuditLogEntry>, AuditError> {
        let chains = self.chains.read().map_err(|_| AuditError::LockPoisoned)?;
        Ok(chains.get(chain_id).cloned().unwrap_or_default())
    }

    /// The chain's tail entry, if any.
    pub fn head(&self, chain_id: &ChainId) -> Result<Option<AuditLogEntry>, AuditError> {
        let chains = self.chains.read().map_err(|_| AuditError::LockPoisoned)?;
        Ok(chains.get(chain_id).and_then(|c| c.last().cloned()))
    }

    pub fn chain_len(&self, chain_id: &ChainId) -> Result<u64, AuditError> {
        let chains = self.chains.read().map_err(|_| AuditError::LockPoisoned)?;
        Ok(chains.get(chain_id).map(|c| c.len() as u64).unwrap_or(0))
    }

    /// Intercepted update path. Always fails, always reports.
    pub fn try_mutate(
        &self,
        chain_id: &ChainId,
        seq: u64,
        agent: &AgentId,
        _new_payload: serde_json::Value,
    ) -> Result<(), AuditError> {
        self.intercept(chain_id, seq, agent, "update")
    }

    /// Intercepted delete path. Always fails, always reports.
    pub fn try_delete(&self, chain_id: &ChainId, seq: u64, agent: &AgentId) -> Result<(), AuditError> {
        self.intercept(chain_id, seq, agent, "delete")
    }

    fn intercept(
        &self,
        chain_id: &ChainId,
        seq: u64,
        agent: &AgentId,
        op: &str,
    ) -> Result<(), AuditError> {
        warn!(chain = %chain_id, seq, agent = %agent, op, "tamper attempt on audit log intercepted");
        if let Ok(slot) = self.tamper_sink.read() {
            if let Some(sink) = slot.as_ref() {
                sink.tamper_attempt(chain_id, seq, agent);
            }
        }
        Err(AuditError::ImmutableWriteAttempt {
            chain_id: chain_id.clone(),
            seq,
        })
    }

    /// Direct payload overwrite bypassing every guard, for corruption
    /// tests only.
    #[doc(hidden)]
    pub fn corrupt_payload_unchecked(
        &self,
        chain_id: &ChainId,
        seq: u64,
        payload: serde_json::Value,
    ) -> Result<(), AuditError> {
        let mut chains = self.chains.write().map_err(|_| AuditError::LockPoisoned)?;
        let entry = chains
            .get_mut(chain_id)
            .and_then(|c| c.get_mut(seq as usize))
            .ok_or(AuditError::ImmutableWriteAttempt {
                chain_id: chain_id.clone(),
                seq,
            })?;
        entry.payload = payload;
        Ok(())
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}
