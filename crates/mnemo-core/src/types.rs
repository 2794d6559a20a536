use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an observation.
pub type ObservationId = Uuid;

/// Unique identifier for a long-term memory record.
pub type MemoryId = Uuid;

/// Identifier of a session source (a session file, a project log, ...).
pub type SourceId = String;

/// Identifier naming a core-memory writer destination, e.g. "claude_md".
pub type TargetId = String;

/// Review status of an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObservationStatus {
    Pending,
    Approved,
    Denied,
}

impl ObservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObservationStatus::Pending => "pending",
            ObservationStatus::Approved => "approved",
            ObservationStatus::Denied => "denied",
        }
    }
}

impl std::fmt::Display for ObservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ObservationStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ObservationStatus::Pending),
            "approved" => Ok(ObservationStatus::Approved),
            "denied" => Ok(ObservationStatus::Denied),
            other => Err(format!("unknown observation status '{other}'")),
        }
    }
}

/// Lifecycle status of a long-term memory record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryStatus {
    Active,
    PromotedToCore,
    Rejected,
}

impl MemoryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryStatus::Active => "active",
            MemoryStatus::PromotedToCore => "promoted_to_core",
            MemoryStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, MemoryStatus::Active)
    }
}

impl std::fmt::Display for MemoryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an observation was seen: which session, from which assistant, and when.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRef {
    pub source_id: SourceId,
    /// Assistant that produced the session, e.g. "claude-code" or "cursor".
    pub tool_name: String,
    pub timestamp: DateTime<Utc>,
}

impl SourceRef {
    pub fn new(
        source_id: impl Into<String>,
        tool_name: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            tool_name: tool_name.into(),
            timestamp,
        }
    }
}

/// Add `source` to `refs` unless an identical reference is already present.
/// Returns true when the set grew.
pub fn union_source(refs: &mut Vec<SourceRef>, source: SourceRef) -> bool {
    if refs.contains(&source) {
        false
    } else {
        refs.push(source);
        true
    }
}

/// Promotion thresholds for a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromotionThresholds {
    /// Pending observations reaching this count are surfaced as ready for review.
    pub min_count_to_long_term: u32,
    /// Minimum detection count before a long-term item may enter core memory.
    pub min_count_for_core: u32,
    /// Minimum whole days an item must spend in long-term memory.
    pub min_days_in_long_term: u32,
}

impl Default for PromotionThresholds {
    fn default() -> Self {
        Self {
            min_count_to_long_term: 3,
            min_count_for_core: 5,
            min_days_in_long_term: 7,
        }
    }
}

impl PromotionThresholds {
    pub fn new(min_count_to_long_term: u32, min_count_for_core: u32, min_days_in_long_term: u32) -> Self {
        Self {
            min_count_to_long_term,
            min_count_for_core,
            min_days_in_long_term,
        }
    }

    /// Minimum time in long-term memory as a duration.
    pub fn min_age(&self) -> Duration {
        Duration::days(i64::from(self.min_days_in_long_term))
    }

    /// Core-promotion predicate shared by listing and promotion.
    pub fn allows_core(&self, count: u32, promoted_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        count >= self.min_count_for_core && now - promoted_at >= self.min_age()
    }
}
