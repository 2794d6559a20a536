use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use mnemo_core::{
    MemoryId, MemoryStatus, MnemoError, ObservationId, ObservationStatus, PromotionThresholds,
    Result, SourceRef, TargetId, union_source,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::long_term::LongTermMemory;
use crate::observation::{Observation, ObservationStore};
use crate::store::RecordStore;
use crate::writer::{CoreMemoryWriter, format_entry};

/// Aggregate numbers for status displays.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub pending_observations: usize,
    pub active_long_term: usize,
    pub promoted_to_core: usize,
}

/// Promotion engine spanning the three memory tiers.
///
/// Owns the observation store, the long-term collection, and the registered
/// core-memory writers. Every promotion is an explicit call; nothing moves
/// between tiers on its own.
pub struct MemoryHierarchy {
    observations: ObservationStore,
    store: RecordStore<Vec<LongTermMemory>>,
    memories: Vec<LongTermMemory>,
    writers: BTreeMap<TargetId, Arc<dyn CoreMemoryWriter>>,
    thresholds: PromotionThresholds,
}

impl MemoryHierarchy {
    pub fn open(
        observations: ObservationStore,
        store: RecordStore<Vec<LongTermMemory>>,
        thresholds: PromotionThresholds,
    ) -> Result<Self> {
        let memories = store.load()?;
        if !memories.is_empty() {
            info!(count = memories.len(), path = ?store.path(), "loaded long-term memories");
        }
        Ok(Self {
            observations,
            store,
            memories,
            writers: BTreeMap::new(),
            thresholds,
        })
    }

    /// Register the writer responsible for `target`.
    pub fn with_writer(mut self, target: impl Into<TargetId>, writer: Arc<dyn CoreMemoryWriter>) -> Self {
        self.register_writer(target, writer);
        self
    }

    pub fn register_writer(&mut self, target: impl Into<TargetId>, writer: Arc<dyn CoreMemoryWriter>) {
        self.writers.insert(target.into(), writer);
    }

    pub fn targets(&self) -> Vec<&str> {
        self.writers.keys().map(|t| t.as_str()).collect()
    }

    pub fn thresholds(&self) -> &PromotionThresholds {
        &self.thresholds
    }

    pub fn observations(&self) -> &ObservationStore {
        &self.observations
    }

    pub fn observations_mut(&mut self) -> &mut ObservationStore {
        &mut self.observations
    }

    // ── Observation hand-off ───────────────────────────────────

    /// Submit a detection. When it lands on an approved observation whose
    /// long-term record is still active, the evidence is forwarded there too.
    ///
    /// The observation is saved first. A failure to save the forwarded
    /// evidence is logged and does not fail the call, since the observation
    /// change is already durable.
    pub fn observe(&mut self, text: &str, source: SourceRef) -> Result<Observation> {
        let observation = self.observations.submit(text, source.clone())?;
        self.forward_evidence(&observation, source);
        Ok(observation)
    }

    /// Batch form of [`observe`](Self::observe). The observation side is
    /// all-or-nothing; forwarding happens after it has been persisted.
    pub fn observe_batch(&mut self, candidates: Vec<(String, SourceRef)>) -> Result<Vec<Observation>> {
        let sources: Vec<SourceRef> = candidates.iter().map(|(_, s)| s.clone()).collect();
        let observations = self.observations.submit_batch(candidates)?;
        for (observation, source) in observations.iter().zip(sources) {
            self.forward_evidence(observation, source);
        }
        Ok(observations)
    }

    fn forward_evidence(&mut self, observation: &Observation, source: SourceRef) {
        if observation.status != ObservationStatus::Approved {
            return;
        }
        let linked = self
            .memories
            .iter()
            .find(|m| m.observation_id == observation.id && m.status == MemoryStatus::Active)
            .map(|m| m.id);
        if let Some(memory_id) = linked {
            if let Err(e) = self.reinforce(memory_id, source) {
                warn!(
                    id = %memory_id,
                    observation = %observation.id,
                    error = %e,
                    "failed to forward evidence to long-term memory"
                );
            }
        }
    }

    /// Approve a pending observation and promote it to long-term memory.
    /// An already-approved observation is promoted without re-approval.
    pub fn approve_and_promote(&mut self, id: ObservationId) -> Result<LongTermMemory> {
        let status = self.observations.get(id)?.status;
        let observation = match status {
            ObservationStatus::Approved => self.observations.get(id)?.clone(),
            _ => self.observations.approve(id)?,
        };
        self.promote_to_long_term(&observation)
    }

    // ── Long-term tier ─────────────────────────────────────────

    pub fn promote_to_long_term(&mut self, observation: &Observation) -> Result<LongTermMemory> {
        self.promote_to_long_term_at(observation, Utc::now())
    }

    pub fn promote_to_long_term_at(
        &mut self,
        observation: &Observation,
        now: DateTime<Utc>,
    ) -> Result<LongTermMemory> {
        if observation.status != ObservationStatus::Approved {
            return Err(MnemoError::InvalidTransition {
                kind: "observation",
                id: observation.id.to_string(),
                from: observation.status.to_string(),
                action: "promote to long-term",
            });
        }

        if let Some(existing) = self
            .memories
            .iter()
            .find(|m| m.observation_id == observation.id)
        {
            debug!(id = %existing.id, observation = %observation.id, "already in long-term memory");
            return Ok(existing.clone());
        }

        let memory = LongTermMemory::from_observation(observation, now);
        let snapshot = self.memories.clone();
        self.memories.push(memory.clone());
        self.commit(snapshot)?;
        info!(id = %memory.id, observation = %observation.id, count = memory.count, "promoted to long-term memory");
        Ok(memory)
    }

    pub fn get(&self, id: MemoryId) -> Result<&LongTermMemory> {
        self.memories
            .iter()
            .find(|m| m.id == id)
            .ok_or_else(|| not_found(id))
    }

    /// All long-term records in promotion order.
    pub fn all(&self) -> &[LongTermMemory] {
        &self.memories
    }

    pub fn list_by_status(&self, status: MemoryStatus) -> Vec<&LongTermMemory> {
        self.memories.iter().filter(|m| m.status == status).collect()
    }

    /// Add evidence to an active long-term record.
    pub fn reinforce(&mut self, id: MemoryId, source: SourceRef) -> Result<LongTermMemory> {
        self.reinforce_at(id, source, Utc::now())
    }

    pub fn reinforce_at(
        &mut self,
        id: MemoryId,
        source: SourceRef,
        now: DateTime<Utc>,
    ) -> Result<LongTermMemory> {
        let idx = self.require_active(id, "reinforce")?;
        let snapshot = self.memories.clone();
        let memory = &mut self.memories[idx];
        memory.count = memory.count.saturating_add(1);
        if now > memory.last_seen_at {
            memory.last_seen_at = now;
        }
        union_source(&mut memory.source_refs, source);
        let updated = memory.clone();
        self.commit(snapshot)?;
        debug!(id = %id, count = updated.count, "reinforced long-term memory");
        Ok(updated)
    }

    pub fn reject(&mut self, id: MemoryId) -> Result<LongTermMemory> {
        let idx = self.require_active(id, "reject")?;
        let snapshot = self.memories.clone();
        self.memories[idx].status = MemoryStatus::Rejected;
        let updated = self.memories[idx].clone();
        self.commit(snapshot)?;
        info!(id = %id, "long-term memory rejected");
        Ok(updated)
    }

    // ── Core tier ──────────────────────────────────────────────

    /// Active records eligible for core promotion under `thresholds`, highest
    /// count first, longest-waiting first among equal counts.
    pub fn list_promotable(&self, thresholds: &PromotionThresholds) -> Vec<&LongTermMemory> {
        self.list_promotable_at(thresholds, Utc::now())
    }

    pub fn list_promotable_at(
        &self,
        thresholds: &PromotionThresholds,
        now: DateTime<Utc>,
    ) -> Vec<&LongTermMemory> {
        let mut eligible: Vec<&LongTermMemory> = self
            .memories
            .iter()
            .filter(|m| m.status == MemoryStatus::Active)
            .filter(|m| thresholds.allows_core(m.count, m.promoted_to_long_term_at, now))
            .collect();
        eligible.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then(a.promoted_to_long_term_at.cmp(&b.promoted_to_long_term_at))
        });
        eligible
    }

    /// Write an approved record to each of `targets` and mark it promoted once
    /// every requested target has received it.
    ///
    /// Targets delivered by an earlier partial attempt are skipped, so a retry
    /// with the failed subset never appends twice to the same target. If the
    /// delivery record cannot be saved, the error is still `PartialPromotion`
    /// with `persist_error` set.
    pub fn promote_to_core(&mut self, id: MemoryId, targets: &[TargetId]) -> Result<LongTermMemory> {
        self.promote_to_core_at(id, targets, Utc::now())
    }

    pub fn promote_to_core_at(
        &mut self,
        id: MemoryId,
        targets: &[TargetId],
        now: DateTime<Utc>,
    ) -> Result<LongTermMemory> {
        if targets.is_empty() {
            return Err(MnemoError::InvalidInput(
                "core promotion needs at least one target".into(),
            ));
        }
        let idx = self.require_active(id, "promote to core")?;

        let memory = &self.memories[idx];
        if !self
            .thresholds
            .allows_core(memory.count, memory.promoted_to_long_term_at, now)
        {
            return Err(MnemoError::NotEligible {
                id: id.to_string(),
                reason: format!(
                    "count {} (needs {}), {} days in long-term (needs {})",
                    memory.count,
                    self.thresholds.min_count_for_core,
                    memory.days_in_long_term(now),
                    self.thresholds.min_days_in_long_term,
                ),
            });
        }

        let entry = format_entry(memory);
        let mut requested: Vec<&TargetId> = Vec::with_capacity(targets.len());
        for target in targets {
            if !requested.contains(&target) {
                requested.push(target);
            }
        }

        let mut succeeded = Vec::new();
        let mut failed = Vec::new();
        let mut newly_delivered = Vec::new();
        for target in requested {
            if memory.is_delivered_to(target) {
                debug!(id = %id, target_id = %target, "target already delivered, skipping");
                succeeded.push(target.clone());
                continue;
            }
            let Some(writer) = self.writers.get(target) else {
                failed.push((target.clone(), "no writer registered for target".to_string()));
                continue;
            };
            match writer.append(target, &entry) {
                Ok(()) => {
                    succeeded.push(target.clone());
                    newly_delivered.push(target.clone());
                }
                Err(e) => {
                    warn!(id = %id, target_id = %target, error = %e, "core memory append failed");
                    failed.push((target.clone(), e.to_string()));
                }
            }
        }

        let progressed = !newly_delivered.is_empty();
        self.memories[idx].delivered_targets.extend(newly_delivered);
        // The appends have happened; a failed save must not forget them.
        let delivered = self.memories.clone();

        if !failed.is_empty() {
            let persist_error = if progressed {
                self.commit(delivered).err().map(|e| e.to_string())
            } else {
                None
            };
            return Err(MnemoError::PartialPromotion {
                id: id.to_string(),
                succeeded,
                failed,
                persist_error,
            });
        }

        let memory = &mut self.memories[idx];
        memory.status = MemoryStatus::PromotedToCore;
        memory.core_targets = memory.delivered_targets.clone();
        memory.promoted_to_core_at = Some(now);
        let updated = memory.clone();
        if let Err(e) = self.commit(delivered) {
            return Err(MnemoError::PartialPromotion {
                id: id.to_string(),
                succeeded,
                failed,
                persist_error: Some(e.to_string()),
            });
        }
        info!(id = %id, targets = ?updated.core_targets, "promoted to core memory");
        Ok(updated)
    }

    // ── Aggregates ─────────────────────────────────────────────

    pub fn counts(&self) -> Counts {
        Counts {
            pending_observations: self.observations.count_by_status(ObservationStatus::Pending),
            active_long_term: self
                .memories
                .iter()
                .filter(|m| m.status == MemoryStatus::Active)
                .count(),
            promoted_to_core: self
                .memories
                .iter()
                .filter(|m| m.status == MemoryStatus::PromotedToCore)
                .count(),
        }
    }

    fn require_active(&self, id: MemoryId, action: &'static str) -> Result<usize> {
        let idx = self
            .memories
            .iter()
            .position(|m| m.id == id)
            .ok_or_else(|| not_found(id))?;
        let status = self.memories[idx].status;
        if status != MemoryStatus::Active {
            return Err(MnemoError::InvalidTransition {
                kind: "long-term memory",
                id: id.to_string(),
                from: status.to_string(),
                action,
            });
        }
        Ok(idx)
    }

    fn commit(&mut self, snapshot: Vec<LongTermMemory>) -> Result<()> {
        if let Err(e) = self.store.save(&self.memories) {
            warn!(error = %e, "failed to persist long-term memory, rolling back");
            self.memories = snapshot;
            return Err(e);
        }
        Ok(())
    }
}

fn not_found(id: MemoryId) -> MnemoError {
    MnemoError::NotFound {
        kind: "long-term memory",
        id: id.to_string(),
    }
}
