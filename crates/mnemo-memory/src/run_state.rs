use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use mnemo_core::{Result, SourceId};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::store::RecordStore;

/// Bookkeeping for batch runs, read by ingestion adapters to bound what they re-read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunState {
    /// Start of the last run that completed successfully.
    pub last_run_at: Option<DateTime<Utc>>,
    /// Start of the most recent run, successful or not.
    pub last_started_at: Option<DateTime<Utc>>,
    pub cursors: BTreeMap<SourceId, Option<DateTime<Utc>>>,
    pub last_error: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
}

pub struct RunStateStore {
    store: RecordStore<RunState>,
    state: RunState,
}

impl RunStateStore {
    pub fn open(store: RecordStore<RunState>) -> Result<Self> {
        let state = store.load()?;
        Ok(Self { store, state })
    }

    pub fn get(&self) -> &RunState {
        &self.state
    }

    pub fn record_run_start(&mut self, at: DateTime<Utc>) -> Result<()> {
        self.update(|s| s.last_started_at = Some(at))
    }

    /// Mark a run as completed. Clears any error left by an earlier run.
    pub fn record_run_success(&mut self, at: DateTime<Utc>) -> Result<()> {
        self.update(|s| {
            s.last_run_at = Some(at);
            s.last_error = None;
            s.last_error_at = None;
        })
    }

    /// Remember the last failure. Never fails: a persistence problem is logged
    /// and the in-memory state is left as it was.
    pub fn record_error(&mut self, message: &str) {
        let now = Utc::now();
        let message = message.to_string();
        if let Err(e) = self.update(|s| {
            s.last_error = Some(message.clone());
            s.last_error_at = Some(now);
        }) {
            warn!(error = %e, run_error = %message, "failed to persist run error");
        }
    }

    pub fn get_cursor(&self, source: &str) -> Option<DateTime<Utc>> {
        self.state.cursors.get(source).copied().flatten()
    }

    pub fn set_cursor(&mut self, source: &str, at: DateTime<Utc>) -> Result<()> {
        debug!(source, cursor = %at, "advancing cursor");
        self.update(|s| {
            s.cursors.insert(source.to_string(), Some(at));
        })
    }

    /// Reset a source so the next run re-reads it from the beginning.
    pub fn clear_cursor(&mut self, source: &str) -> Result<()> {
        self.update(|s| {
            s.cursors.insert(source.to_string(), None);
        })
    }

    fn update(&mut self, mutate: impl FnOnce(&mut RunState)) -> Result<()> {
        let snapshot = self.state.clone();
        mutate(&mut self.state);
        if let Err(e) = self.store.save(&self.state) {
            self.state = snapshot;
            return Err(e);
        }
        Ok(())
    }
}
