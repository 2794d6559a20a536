use std::sync::Arc;

use chrono::{DateTime, Utc};
use mnemo_core::{MnemoError, ObservationId, ObservationStatus, Result, SourceRef, union_source};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::oracle::SimilarityOracle;
use crate::store::RecordStore;

/// A behavioral pattern extracted from one or more sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub id: ObservationId,
    pub text: String,
    /// How many times the pattern has been detected. Starts at 1.
    pub count: u32,
    pub source_refs: Vec<SourceRef>,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub status: ObservationStatus,
}

impl Observation {
    fn new(text: String, source: SourceRef, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text,
            count: 1,
            source_refs: vec![source],
            first_seen_at: now,
            last_seen_at: now,
            status: ObservationStatus::Pending,
        }
    }

    /// Absorb a duplicate detection. Text is never rewritten.
    fn reinforce(&mut self, source: SourceRef, now: DateTime<Utc>) {
        self.count = self.count.saturating_add(1);
        if now > self.last_seen_at {
            self.last_seen_at = now;
        }
        union_source(&mut self.source_refs, source);
    }
}

/// The authoritative collection of observations, kept in insertion order.
pub struct ObservationStore {
    store: RecordStore<Vec<Observation>>,
    observations: Vec<Observation>,
    oracle: Arc<dyn SimilarityOracle>,
}

impl ObservationStore {
    /// Load observations from `store` and bind the similarity oracle.
    pub fn open(
        store: RecordStore<Vec<Observation>>,
        oracle: Arc<dyn SimilarityOracle>,
    ) -> Result<Self> {
        let observations = store.load()?;
        if !observations.is_empty() {
            info!(count = observations.len(), path = ?store.path(), "loaded observations");
        }
        Ok(Self {
            store,
            observations,
            oracle,
        })
    }

    /// Record a candidate pattern, merging it into the first similar live
    /// observation or creating a new one.
    pub fn submit(&mut self, text: &str, source: SourceRef) -> Result<Observation> {
        self.submit_at(text, source, Utc::now())
    }

    pub fn submit_at(
        &mut self,
        text: &str,
        source: SourceRef,
        now: DateTime<Utc>,
    ) -> Result<Observation> {
        let text = validate_text(text)?;
        let snapshot = self.observations.clone();
        let idx = self.absorb(text, source, now);
        let observation = self.observations[idx].clone();
        self.commit(snapshot)?;
        Ok(observation)
    }

    /// Submit several candidates and persist once. Later candidates may merge
    /// into observations created earlier in the same batch. Nothing is kept if
    /// any candidate is invalid or the save fails.
    pub fn submit_batch(&mut self, candidates: Vec<(String, SourceRef)>) -> Result<Vec<Observation>> {
        self.submit_batch_at(candidates, Utc::now())
    }

    pub fn submit_batch_at(
        &mut self,
        candidates: Vec<(String, SourceRef)>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Observation>> {
        let validated = candidates
            .into_iter()
            .map(|(text, source)| validate_text(&text).map(|t| (t, source)))
            .collect::<Result<Vec<_>>>()?;

        let snapshot = self.observations.clone();
        let touched: Vec<usize> = validated
            .into_iter()
            .map(|(text, source)| self.absorb(text, source, now))
            .collect();
        let results = touched
            .into_iter()
            .map(|idx| self.observations[idx].clone())
            .collect();
        self.commit(snapshot)?;
        Ok(results)
    }

    pub fn get(&self, id: ObservationId) -> Result<&Observation> {
        self.observations
            .iter()
            .find(|o| o.id == id)
            .ok_or_else(|| not_found(id))
    }

    /// Observations with `status`, most recently reinforced first.
    pub fn list_by_status(&self, status: ObservationStatus) -> Vec<&Observation> {
        let mut matching: Vec<&Observation> = self
            .observations
            .iter()
            .filter(|o| o.status == status)
            .collect();
        matching.sort_by(|a, b| b.last_seen_at.cmp(&a.last_seen_at));
        matching
    }

    pub fn list_pending(&self) -> Vec<&Observation> {
        self.list_by_status(ObservationStatus::Pending)
    }

    /// Pending observations detected at least `min_count` times.
    pub fn list_ready_for_review(&self, min_count: u32) -> Vec<&Observation> {
        self.list_pending()
            .into_iter()
            .filter(|o| o.count >= min_count)
            .collect()
    }

    /// All observations in insertion order.
    pub fn all(&self) -> &[Observation] {
        &self.observations
    }

    pub fn count_by_status(&self, status: ObservationStatus) -> usize {
        self.observations.iter().filter(|o| o.status == status).count()
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn approve(&mut self, id: ObservationId) -> Result<Observation> {
        self.transition_many(&[id], ObservationStatus::Approved)
            .map(|mut v| v.remove(0))
    }

    pub fn deny(&mut self, id: ObservationId) -> Result<Observation> {
        self.transition_many(&[id], ObservationStatus::Denied)
            .map(|mut v| v.remove(0))
    }

    /// Approve every id or none of them.
    pub fn approve_many(&mut self, ids: &[ObservationId]) -> Result<Vec<Observation>> {
        self.transition_many(ids, ObservationStatus::Approved)
    }

    /// Deny every id or none of them.
    pub fn deny_many(&mut self, ids: &[ObservationId]) -> Result<Vec<Observation>> {
        self.transition_many(ids, ObservationStatus::Denied)
    }

    /// Apply a candidate in memory and return the index of the touched record.
    fn absorb(&mut self, text: String, source: SourceRef, now: DateTime<Utc>) -> usize {
        match self.find_similar(&text) {
            Some(idx) => {
                let existing = &mut self.observations[idx];
                existing.reinforce(source, now);
                debug!(id = %existing.id, count = existing.count, "merged duplicate observation");
                idx
            }
            None => {
                let observation = Observation::new(text, source, now);
                debug!(id = %observation.id, "created observation");
                self.observations.push(observation);
                self.observations.len() - 1
            }
        }
    }

    /// First live observation the oracle judges similar, in insertion order.
    fn find_similar(&self, candidate: &str) -> Option<usize> {
        for (idx, existing) in self.observations.iter().enumerate() {
            if existing.status == ObservationStatus::Denied {
                continue;
            }
            match self.oracle.compare(candidate, &existing.text) {
                Ok(true) => return Some(idx),
                Ok(false) => {}
                Err(e) => {
                    warn!(
                        id = %existing.id,
                        candidate = %preview(candidate),
                        error = %e,
                        "similarity check failed, treating as distinct"
                    );
                }
            }
        }
        None
    }

    fn transition_many(
        &mut self,
        ids: &[ObservationId],
        to: ObservationStatus,
    ) -> Result<Vec<Observation>> {
        let action = match to {
            ObservationStatus::Approved => "approve",
            ObservationStatus::Denied => "deny",
            ObservationStatus::Pending => "reopen",
        };

        let snapshot = self.observations.clone();
        let mut updated = Vec::with_capacity(ids.len());
        for &id in ids {
            match self.observations.iter_mut().find(|o| o.id == id) {
                None => {
                    self.observations = snapshot;
                    return Err(not_found(id));
                }
                Some(o) if o.status != ObservationStatus::Pending => {
                    let from = o.status.to_string();
                    self.observations = snapshot;
                    return Err(MnemoError::InvalidTransition {
                        kind: "observation",
                        id: id.to_string(),
                        from,
                        action,
                    });
                }
                Some(o) => {
                    o.status = to;
                    updated.push(o.clone());
                }
            }
        }

        self.commit(snapshot)?;
        info!(count = updated.len(), status = %to, "observations reviewed");
        Ok(updated)
    }

    /// Persist the current view, restoring `snapshot` if the save fails.
    fn commit(&mut self, snapshot: Vec<Observation>) -> Result<()> {
        if let Err(e) = self.store.save(&self.observations) {
            warn!(error = %e, "failed to persist observations, rolling back");
            self.observations = snapshot;
            return Err(e);
        }
        Ok(())
    }
}

fn validate_text(text: &str) -> Result<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(MnemoError::InvalidInput("observation text is empty".into()));
    }
    Ok(trimmed.to_string())
}

fn not_found(id: ObservationId) -> MnemoError {
    MnemoError::NotFound {
        kind: "observation",
        id: id.to_string(),
    }
}

fn preview(text: &str) -> String {
    let short: String = text.chars().take(60).collect();
    if short.len() < text.len() {
        format!("{short}...")
    } else {
        short
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_truncates_long_text() {
        let long = "x".repeat(100);
        let p = preview(&long);
        assert!(p.ends_with("..."));
        assert_eq!(p.chars().count(), 63);
        assert_eq!(preview("short"), "short");
    }

    #[test]
    fn test_validate_text_trims() {
        assert_eq!(validate_text("  uses tabs ").unwrap(), "uses tabs");
        assert!(matches!(validate_text("   "), Err(MnemoError::InvalidInput(_))));
    }
}
