use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::error::Result;

/// Keyed record storage: one record per unique key, last write wins.
pub trait RecordStore {
    fn upsert(&mut self, key: &str, record: Value) -> Result<()>;

    /// Flush pending writes to durable storage.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Record store kept as one pretty-printed JSON object on disk, keyed by the
/// record's fullname.
///
/// Upserts are buffered in memory; `flush` rewrites the whole file.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    records: BTreeMap<String, Value>,
    dirty: bool,
}

impl JsonFileStore {
    /// Open (or start) the store at `path`, loading any existing records.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let records = match std::fs::read_to_string(&path) {
            Ok(contents) if !contents.trim().is_empty() => serde_json::from_str(&contents)?,
            Ok(_) => BTreeMap::new(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), records = records.len(), "Opened record store");
        Ok(Self {
            path,
            records,
            dirty: false,
        })
    }

    /// Store for one (kind, target) pair, e.g. `submissions-ireland.json`.
    pub fn for_target(dir: &Path, kind: &str, target: &str) -> Result<Self> {
        Self::open(dir.join(format!("{kind}-{target}.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordStore for JsonFileStore {
    fn upsert(&mut self, key: &str, record: Value) -> Result<()> {
        self.records.insert(key.to_string(), record);
        self.dirty = true;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let contents = serde_json::to_string_pretty(&self.records)?;
        std::fs::write(&self.path, contents)?;
        self.dirty = false;
        Ok(())
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

/// In-memory record store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    pub records: BTreeMap<String, Value>,
    pub flushes: usize,
}

impl RecordStore for MemoryStore {
    fn upsert(&mut self, key: &str, record: Value) -> Result<()> {
        self.records.insert(key.to_string(), record);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.flushes += 1;
        Ok(())
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}
