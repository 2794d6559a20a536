use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use mnemo_core::{MnemoError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Schema version written into every document.
pub const SCHEMA_VERSION: u32 = 1;

/// On-disk envelope: `{ "version": N, "records": ... }`.
/// A missing `version` reads as 0; a missing `records` reads as empty.
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: DeserializeOwned + Default"))]
struct Document<T> {
    #[serde(default)]
    version: u32,
    #[serde(default)]
    records: T,
}

#[derive(Serialize)]
struct DocumentRef<'a, T: Serialize> {
    version: u32,
    records: &'a T,
}

/// A typed collection backed by a single JSON document with atomic writes.
///
/// Saves go to a temporary sibling file which is flushed, synced, and then
/// renamed over the target, so a crash mid-write leaves the previous document
/// intact.
pub struct RecordStore<T> {
    path: PathBuf,
    _records: PhantomData<fn() -> T>,
}

impl<T> Clone for RecordStore<T> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            _records: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for RecordStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore").field("path", &self.path).finish()
    }
}

impl<T> RecordStore<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _records: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the collection. A missing file is an empty collection.
    pub fn load(&self) -> Result<T> {
        self.load_versioned().map(|(_, records)| records)
    }

    /// Read the collection together with the schema version it was written with.
    pub fn load_versioned(&self) -> Result<(u32, T)> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = ?self.path, "store file missing, starting empty");
                return Ok((SCHEMA_VERSION, T::default()));
            }
            Err(e) => return Err(self.corrupt(e.to_string())),
        };

        let doc: Document<T> =
            serde_json::from_str(&raw).map_err(|e| self.corrupt(e.to_string()))?;
        if doc.version > SCHEMA_VERSION {
            info!(
                path = ?self.path,
                version = doc.version,
                "store written by a newer schema, reading as-is"
            );
        }
        Ok((doc.version, doc.records))
    }

    /// Replace the on-disk collection atomically.
    pub fn save(&self, records: &T) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(|e| self.write_error(e))?;

        let doc = DocumentRef {
            version: SCHEMA_VERSION,
            records,
        };

        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| self.write_error(e))?;
        serde_json::to_writer_pretty(&mut tmp, &doc).map_err(|e| MnemoError::Write {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        tmp.write_all(b"\n").map_err(|e| self.write_error(e))?;
        tmp.flush().map_err(|e| self.write_error(e))?;
        tmp.as_file().sync_all().map_err(|e| self.write_error(e))?;
        tmp.persist(&self.path)
            .map_err(|e| self.write_error(e.error))?;

        debug!(path = ?self.path, "store saved");
        Ok(())
    }

    fn corrupt(&self, reason: String) -> MnemoError {
        MnemoError::CorruptStore {
            path: self.path.clone(),
            reason,
        }
    }

    fn write_error(&self, e: std::io::Error) -> MnemoError {
        MnemoError::Write {
            path: self.path.clone(),
            reason: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store: RecordStore<Vec<String>> = RecordStore::new(dir.path().join("items.json"));
        store.save(&vec!["a".into(), "b".into()]).unwrap();
        store.save(&vec!["c".into()]).unwrap();

        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
        assert_eq!(store.load().unwrap(), vec!["c".to_string()]);
    }

    #[test]
    fn test_document_has_version_field() {
        let dir = tempfile::tempdir().unwrap();
        let store: RecordStore<Vec<u32>> = RecordStore::new(dir.path().join("n.json"));
        store.save(&vec![1, 2, 3]).unwrap();

        let raw = std::fs::read_to_string(store.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["version"], SCHEMA_VERSION);
        assert_eq!(value["records"], serde_json::json!([1, 2, 3]));
    }

    #[test]
    fn test_missing_version_reads_as_zero() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.json");
        std::fs::write(&path, r#"{"records": [7]}"#).unwrap();
        let store: RecordStore<Vec<u32>> = RecordStore::new(&path);
        let (version, records) = store.load_versioned().unwrap();
        assert_eq!(version, 0);
        assert_eq!(records, vec![7]);
    }
}
