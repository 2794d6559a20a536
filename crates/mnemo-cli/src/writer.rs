use std::io::Write;
use std::path::{Path, PathBuf};

use mnemo_core::{MnemoError, Result};
use mnemo_memory::CoreMemoryWriter;
use tracing::debug;

/// Appends core-memory entries to a markdown file such as `CLAUDE.md`.
///
/// The file and its parent directories are created on first use. When a
/// heading is configured and the file does not contain it yet, the heading is
/// written once before the entry.
#[derive(Debug, Clone)]
pub struct FileWriter {
    path: PathBuf,
    heading: Option<String>,
}

impl FileWriter {
    pub fn new(path: impl Into<PathBuf>, heading: Option<String>) -> Self {
        Self {
            path: path.into(),
            heading,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, entry: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let existing = match std::fs::read_to_string(&self.path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e),
        };

        let mut out = String::new();
        if !existing.is_empty() && !existing.ends_with('\n') {
            out.push('\n');
        }
        if let Some(heading) = &self.heading {
            let present = existing.lines().any(|l| l.trim() == heading.trim());
            if !present {
                if !existing.trim().is_empty() {
                    out.push('\n');
                }
                out.push_str(heading.trim());
                out.push_str("\n\n");
            }
        }
        out.push_str(entry);
        if !entry.ends_with('\n') {
            out.push('\n');
        }

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(out.as_bytes())?;
        file.sync_all()
    }
}

impl CoreMemoryWriter for FileWriter {
    fn append(&self, target: &str, entry: &str) -> Result<()> {
        self.write(entry).map_err(|e| MnemoError::Writer {
            target: target.to_string(),
            reason: format!("{}: {}", self.path.display(), e),
        })?;
        debug!(target_id = %target, path = ?self.path, "appended core memory entry");
        Ok(())
    }
}
