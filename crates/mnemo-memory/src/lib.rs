//! # mnemo-memory
//!
//! Three-tier memory hierarchy for learned coding habits:
//!
//! - **Observations**: patterns extracted from sessions, deduplicated by an
//!   injected similarity oracle and awaiting human review.
//! - **Long-term memory**: approved observations that keep accumulating
//!   evidence until they qualify for core promotion.
//! - **Core memory**: external files written through injected writers, only
//!   on explicit approval.
//!
//! Every collection lives in its own JSON document written atomically by
//! [`RecordStore`]. Run bookkeeping (cursors, last run, last error) lives in
//! [`RunStateStore`].

pub mod hierarchy;
pub mod long_term;
pub mod observation;
pub mod oracle;
pub mod run_state;
pub mod store;
pub mod writer;

use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use hierarchy::{Counts, MemoryHierarchy};
pub use long_term::LongTermMemory;
pub use observation::{Observation, ObservationStore};
pub use oracle::{NormalizedTextOracle, SimilarityOracle};
pub use run_state::{RunState, RunStateStore};
pub use store::{RecordStore, SCHEMA_VERSION};
pub use writer::{CoreMemoryWriter, format_entry};

use mnemo_core::{PromotionThresholds, Result};

/// Locations of the three state documents inside a data directory.
#[derive(Debug, Clone)]
pub struct DataFiles {
    pub observations: PathBuf,
    pub long_term: PathBuf,
    pub run_state: PathBuf,
}

impl DataFiles {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            observations: dir.join("observations.json"),
            long_term: dir.join("long_term.json"),
            run_state: dir.join("run_state.json"),
        }
    }

    /// Open the hierarchy (observations + long-term) with the given oracle.
    pub fn open_hierarchy(
        &self,
        oracle: Arc<dyn SimilarityOracle>,
        thresholds: PromotionThresholds,
    ) -> Result<MemoryHierarchy> {
        let observations = ObservationStore::open(RecordStore::new(&self.observations), oracle)?;
        MemoryHierarchy::open(observations, RecordStore::new(&self.long_term), thresholds)
    }

    pub fn open_run_state(&self) -> Result<RunStateStore> {
        RunStateStore::open(RecordStore::new(&self.run_state))
    }
}
