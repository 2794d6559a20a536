use std::path::PathBuf;

use thiserror::Error;

/// Unified error type for the entire Mnemo workspace.
#[derive(Error, Debug)]
pub enum MnemoError {
    // ── Lookup / state-machine errors ──────────────────────────
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("invalid transition for {kind} {id}: cannot {action} from {from}")]
    InvalidTransition {
        kind: &'static str,
        id: String,
        from: String,
        action: &'static str,
    },

    #[error("long-term memory {id} is not eligible for core promotion: {reason}")]
    NotEligible { id: String, reason: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    // ── Persistence errors ─────────────────────────────────────
    #[error("corrupt store at {}: {reason}", path.display())]
    CorruptStore { path: PathBuf, reason: String },

    #[error("failed to write {}: {reason}", path.display())]
    Write { path: PathBuf, reason: String },

    // ── Promotion errors ───────────────────────────────────────
    /// Core promotion did not complete. `failed` holds `(target, reason)` pairs
    /// to retry; `succeeded` already received the entry. `persist_error` is set
    /// when the delivery record could not be saved, in which case the record
    /// stays active even if `failed` is empty.
    #[error(
        "partial promotion of {id}: succeeded [{}], failed [{}]{}",
        succeeded.join(", "),
        failed.iter().map(|(t, r)| format!("{t}: {r}")).collect::<Vec<_>>().join(", "),
        persist_error.as_deref().map(|e| format!("; progress not saved: {e}")).unwrap_or_default()
    )]
    PartialPromotion {
        id: String,
        succeeded: Vec<String>,
        failed: Vec<(String, String)>,
        persist_error: Option<String>,
    },

    // ── Collaborator errors ────────────────────────────────────
    #[error("similarity oracle error: {0}")]
    Oracle(String),

    #[error("core memory writer error: {target}: {reason}")]
    Writer { target: String, reason: String },

    // ── Config errors ──────────────────────────────────────────
    #[error("config error: {0}")]
    Config(String),

    #[error("config validation failed: {field}: {reason}")]
    ConfigValidation { field: String, reason: String },

    // ── Generic wrappers ───────────────────────────────────────
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl MnemoError {
    /// Targets that still need an append after a partial promotion.
    pub fn failed_targets(&self) -> Vec<String> {
        match self {
            MnemoError::PartialPromotion { failed, .. } => {
                failed.iter().map(|(t, _)| t.clone()).collect()
            }
            _ => Vec::new(),
        }
    }

    /// Environment problems (disk, corrupt files) as opposed to caller bugs.
    pub fn is_storage_error(&self) -> bool {
        matches!(
            self,
            MnemoError::CorruptStore { .. } | MnemoError::Write { .. } | MnemoError::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, MnemoError>;
