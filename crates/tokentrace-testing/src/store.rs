//! Operation store fixtures.

use anyhow::Result;
use serde_json::{Map, Value};
use std::path::Path;
use tokentrace_store::{MemoryStore, OperationKey, OperationStore};
use tokentrace_types::{RawOperation, TokenUsage};

/// Builder for a [`MemoryStore`] holding one session's captured operations.
pub struct TestStore {
    session_id: String,
    store: MemoryStore,
}

impl TestStore {
    pub fn new(session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            store: MemoryStore::new(),
        }
    }

    pub fn operation(mut self, timestamp: i64, operation: RawOperation) -> Self {
        self.store
            .insert_operation(&OperationKey::new(&self.session_id, timestamp), &operation)
            .expect("raw operation serializes");
        self
    }

    /// A captured tool response of `size` bytes, optionally with usage.
    pub fn tool_response(
        self,
        timestamp: i64,
        tool: &str,
        tool_use_id: &str,
        size: u64,
        usage: Option<TokenUsage>,
    ) -> Self {
        self.operation(
            timestamp,
            RawOperation {
                tool: tool.to_string(),
                response_size: Some(size),
                tool_use_id: Some(tool_use_id.to_string()),
                usage,
                ..Default::default()
            },
        )
    }

    /// Insert a document verbatim, e.g. a malformed one.
    pub fn raw_document(mut self, timestamp: i64, document: &str) -> Self {
        self.store.insert(
            OperationKey::new(&self.session_id, timestamp).to_string(),
            document,
        );
        self
    }

    pub fn unavailable(mut self) -> Self {
        self.store.set_available(false);
        self
    }

    pub fn build(self) -> MemoryStore {
        self.store
    }

    /// Dump the store as a snapshot file readable by `SnapshotStore`.
    pub fn write_snapshot(&self, path: &Path) -> Result<()> {
        let mut dump = Map::new();
        for key in self.store.keys("*")? {
            if let Some(document) = self.store.get(&key)? {
                dump.insert(key, Value::String(document));
            }
        }
        std::fs::write(path, serde_json::to_string_pretty(&Value::Object(dump))?)?;
        Ok(())
    }
}
