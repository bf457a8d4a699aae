// Operation store access
// Read-only: hooks write, the engine only enumerates and looks up

mod error;
mod index;
mod key;
mod store;

// Public API
pub use error::{Error, Result};
pub use index::{RawOperationIndex, StoredOperation, fetch_operation, fetch_session_operations};
pub use key::{OperationKey, glob_to_regex};
pub use store::{MemoryStore, OperationStore, SnapshotStore, UnavailableStore};
