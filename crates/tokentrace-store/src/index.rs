use std::collections::{BTreeMap, HashMap};

use tokentrace_types::RawOperation;

use crate::key::OperationKey;
use crate::store::OperationStore;
use crate::{Error, Result};

/// A raw operation together with the timestamp from its key.
#[derive(Debug, Clone)]
pub struct StoredOperation {
    pub timestamp: i64,
    pub operation: RawOperation,
}

/// Point lookup of one operation. Missing keys and unparseable documents
/// both read as `None`.
pub fn fetch_operation(
    store: &dyn OperationStore,
    key: &OperationKey,
) -> Result<Option<RawOperation>> {
    let Some(document) = store.get(&key.to_string())? else {
        return Ok(None);
    };
    match serde_json::from_str::<RawOperation>(&document) {
        Ok(operation) => Ok(Some(operation)),
        Err(err) => {
            tracing::debug!("Ignoring unparseable store document {}: {}", key, err);
            Ok(None)
        }
    }
}

/// Every operation captured for a session, ordered by timestamp.
///
/// Keys that do not parse, vanish between enumeration and lookup, or hold
/// malformed documents are skipped.
pub fn fetch_session_operations(
    store: &dyn OperationStore,
    session_id: &str,
) -> Result<Vec<StoredOperation>> {
    if !store.is_available() {
        return Err(Error::Unavailable(format!(
            "cannot fetch operations for session {}",
            session_id
        )));
    }

    let mut operations = Vec::new();
    for key in store.keys(&OperationKey::session_pattern(session_id))? {
        let key = match OperationKey::parse(&key) {
            Ok(key) if key.session_id == session_id => key,
            Ok(_) => continue,
            Err(err) => {
                tracing::debug!("Skipping store key: {}", err);
                continue;
            }
        };
        if let Some(operation) = fetch_operation(store, &key)? {
            operations.push(StoredOperation {
                timestamp: key.timestamp,
                operation,
            });
        }
    }
    operations.sort_by_key(|op| op.timestamp);
    Ok(operations)
}

/// In-memory lookup tables over one session's raw operations.
#[derive(Debug, Clone, Default)]
pub struct RawOperationIndex {
    operations: Vec<StoredOperation>,
    by_tool_use: HashMap<String, usize>,
    by_message: HashMap<String, Vec<usize>>,
    by_timestamp: BTreeMap<i64, Vec<usize>>,
}

impl RawOperationIndex {
    pub fn new(mut operations: Vec<StoredOperation>) -> Self {
        operations.sort_by_key(|op| op.timestamp);

        let mut index = Self::default();
        for (i, stored) in operations.iter().enumerate() {
            if let Some(id) = &stored.operation.tool_use_id {
                index.by_tool_use.entry(id.clone()).or_insert(i);
            }
            if let Some(id) = &stored.operation.message_id {
                index.by_message.entry(id.clone()).or_default().push(i);
            }
            index.by_timestamp.entry(stored.timestamp).or_default().push(i);
        }
        index.operations = operations;
        index
    }

    /// Fetch and index a session. An unreachable store or a failed
    /// enumeration yields an empty index: callers fall back to estimates.
    pub fn load(store: &dyn OperationStore, session_id: &str) -> Self {
        match fetch_session_operations(store, session_id) {
            Ok(operations) => {
                tracing::debug!(
                    "Indexed {} stored operations for session {}",
                    operations.len(),
                    session_id
                );
                Self::new(operations)
            }
            Err(err) => {
                tracing::warn!("{}; token allocation will be estimated", err);
                Self::default()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StoredOperation> {
        self.operations.iter()
    }

    pub fn by_tool_use_id(&self, tool_use_id: &str) -> Option<&RawOperation> {
        self.by_tool_use
            .get(tool_use_id)
            .map(|&i| &self.operations[i].operation)
    }

    pub fn by_message_id(&self, message_id: &str) -> impl Iterator<Item = &RawOperation> {
        self.by_message
            .get(message_id)
            .into_iter()
            .flatten()
            .map(|&i| &self.operations[i].operation)
    }

    pub fn at_timestamp(&self, timestamp: i64) -> Option<&RawOperation> {
        self.by_timestamp
            .get(&timestamp)
            .and_then(|ids| ids.first())
            .map(|&i| &self.operations[i].operation)
    }

    /// Pair a transcript entry with its raw operation: by `tool_use_id`,
    /// then by `message_id` (skipping operations bound to another tool use),
    /// then by exact timestamp.
    pub fn find(
        &self,
        tool_use_id: Option<&str>,
        message_id: Option<&str>,
        timestamp: i64,
    ) -> Option<&RawOperation> {
        if let Some(op) = tool_use_id.and_then(|id| self.by_tool_use_id(id)) {
            return Some(op);
        }
        if let Some(message_id) = message_id {
            let matched = self.by_message_id(message_id).find(|op| {
                match (&op.tool_use_id, tool_use_id) {
                    (Some(bound), Some(wanted)) => bound == wanted,
                    _ => true,
                }
            });
            if matched.is_some() {
                return matched;
            }
        }
        self.at_timestamp(timestamp).filter(|op| {
            match (&op.tool_use_id, tool_use_id) {
                (Some(bound), Some(wanted)) => bound == wanted,
                _ => true,
            }
        })
    }

    /// Pair an assistant turn by `message_id`, then by exact timestamp.
    /// Operations bound to a tool use belong to that tool's response and
    /// are never returned.
    pub fn find_for_turn(
        &self,
        message_id: Option<&str>,
        timestamp: i64,
    ) -> Option<&RawOperation> {
        let unbound = |op: &&RawOperation| op.tool_use_id.is_none();
        message_id
            .and_then(|id| self.by_message_id(id).find(unbound))
            .or_else(|| {
                self.by_timestamp
                    .get(&timestamp)
                    .into_iter()
                    .flatten()
                    .map(|&i| &self.operations[i].operation)
                    .find(unbound)
            })
    }
}
