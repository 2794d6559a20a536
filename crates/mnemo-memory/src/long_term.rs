use chrono::{DateTime, Utc};
use mnemo_core::{MemoryId, MemoryStatus, ObservationId, SourceRef, TargetId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::observation::Observation;

/// An approved observation tracked for core-memory promotion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LongTermMemory {
    pub id: MemoryId,
    /// The observation this record was promoted from.
    pub observation_id: ObservationId,
    pub text: String,
    pub count: u32,
    pub source_refs: Vec<SourceRef>,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub promoted_to_long_term_at: DateTime<Utc>,
    pub status: MemoryStatus,
    /// Targets that received the entry. Set only once promoted to core.
    #[serde(default)]
    pub core_targets: Vec<TargetId>,
    /// Targets whose writer already succeeded, including partial attempts.
    #[serde(default)]
    pub delivered_targets: Vec<TargetId>,
    #[serde(default)]
    pub promoted_to_core_at: Option<DateTime<Utc>>,
}

impl LongTermMemory {
    pub(crate) fn from_observation(observation: &Observation, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            observation_id: observation.id,
            text: observation.text.clone(),
            count: observation.count,
            source_refs: observation.source_refs.clone(),
            first_seen_at: observation.first_seen_at,
            last_seen_at: observation.last_seen_at,
            promoted_to_long_term_at: now,
            status: MemoryStatus::Active,
            core_targets: Vec::new(),
            delivered_targets: Vec::new(),
            promoted_to_core_at: None,
        }
    }

    pub fn is_delivered_to(&self, target: &str) -> bool {
        self.delivered_targets.iter().any(|t| t == target)
    }

    /// Whole days spent in long-term memory as of `now`.
    pub fn days_in_long_term(&self, now: DateTime<Utc>) -> i64 {
        (now - self.promoted_to_long_term_at).num_days()
    }
}
