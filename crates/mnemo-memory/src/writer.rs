use mnemo_core::Result;

use crate::long_term::LongTermMemory;

/// Appends a formatted entry to an external core-memory artifact.
///
/// Appends may be repeated for the same content; the hierarchy only guarantees
/// it will not re-append to a target already recorded as delivered.
pub trait CoreMemoryWriter: Send + Sync {
    fn append(&self, target: &str, entry: &str) -> Result<()>;
}

impl<F> CoreMemoryWriter for F
where
    F: Fn(&str, &str) -> Result<()> + Send + Sync,
{
    fn append(&self, target: &str, entry: &str) -> Result<()> {
        self(target, entry)
    }
}

/// Render a long-term memory as a plain-text core-memory entry.
pub fn format_entry(memory: &LongTermMemory) -> String {
    let sources = memory.source_refs.len();
    format!(
        "- {}\n  (seen {}x across {} source{}; first {}, last {})\n",
        memory.text.trim(),
        memory.count,
        sources,
        if sources == 1 { "" } else { "s" },
        memory.first_seen_at.format("%Y-%m-%d"),
        memory.last_seen_at.format("%Y-%m-%d"),
    )
}
