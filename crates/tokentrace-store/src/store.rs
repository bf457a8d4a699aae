use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tokentrace_types::RawOperation;

use crate::key::{OperationKey, glob_to_regex};
use crate::{Error, Result};

/// Read access to the key-value store the instrumentation hooks write into.
///
/// Implementations are queried sequentially. A missing key is `Ok(None)`,
/// never an error.
pub trait OperationStore: Send + Sync {
    /// Whether the backing store can currently be reached.
    fn is_available(&self) -> bool;

    /// Raw document stored under `key`.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Every key matching a glob pattern (`*`, `?`), in ascending order.
    fn keys(&self, pattern: &str) -> Result<Vec<String>>;
}

/// In-process store backed by an ordered map.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
    available: bool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            available: true,
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, document: impl Into<String>) {
        self.entries.insert(key.into(), document.into());
    }

    /// Store a raw operation under its canonical key.
    pub fn insert_operation(&mut self, key: &OperationKey, operation: &RawOperation) -> Result<()> {
        let document = serde_json::to_string(operation)?;
        self.insert(key.to_string(), document);
        Ok(())
    }

    /// Simulate the store going away (or coming back).
    pub fn set_available(&mut self, available: bool) {
        self.available = available;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn ensure_available(&self) -> Result<()> {
        if self.available {
            Ok(())
        } else {
            Err(Error::Unavailable("memory store disabled".to_string()))
        }
    }
}

impl OperationStore for MemoryStore {
    fn is_available(&self) -> bool {
        self.available
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        self.ensure_available()?;
        Ok(self.entries.get(key).cloned())
    }

    fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        self.ensure_available()?;
        let re = glob_to_regex(pattern)?;
        Ok(self
            .entries
            .keys()
            .filter(|key| re.is_match(key))
            .cloned()
            .collect())
    }
}

/// Read-only store loaded from a JSON dump: one object mapping keys to
/// documents. Documents may be JSON strings or inline JSON values.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
    inner: MemoryStore,
}

impl SnapshotStore {
    pub fn open(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let dump: BTreeMap<String, Value> = serde_json::from_str(&content)?;

        let mut inner = MemoryStore::new();
        for (key, value) in dump {
            let document = match value {
                Value::String(text) => text,
                other => other.to_string(),
            };
            inner.insert(key, document);
        }
        tracing::debug!(
            "Loaded {} store entries from {}",
            inner.len(),
            path.display()
        );
        Ok(Self {
            path: path.to_path_buf(),
            inner,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl OperationStore for SnapshotStore {
    fn is_available(&self) -> bool {
        true
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key)
    }

    fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        self.inner.keys(pattern)
    }
}

/// A store that is never reachable. Correlating against it yields
/// estimated allocation only.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableStore;

impl OperationStore for UnavailableStore {
    fn is_available(&self) -> bool {
        false
    }

    fn get(&self, _key: &str) -> Result<Option<String>> {
        Err(Error::Unavailable("no operation store configured".to_string()))
    }

    fn keys(&self, _pattern: &str) -> Result<Vec<String>> {
        Err(Error::Unavailable("no operation store configured".to_string()))
    }
}
