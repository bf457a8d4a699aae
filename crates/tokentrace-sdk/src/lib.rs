//! tokentrace-sdk: per-turn token accounting for recorded agent sessions.
//!
//! # Overview
//!
//! A session leaves two traces behind: an append-only JSONL transcript whose
//! assistant turns may carry exact usage counters, and an ephemeral key-value
//! store of tool invocations captured by instrumentation hooks. Neither is
//! complete on its own. `tokentrace-sdk` merges them into an ordered list of
//! [`Bundle`]s, one per conversational turn, each operation tagged with
//! whether its token figure is exact, a proportional share of an exact
//! total, or an estimate. Sub-agent runs recorded as sidechain records are
//! folded into a single bundle right after the turn that delegated them.
//!
//! # Quickstart
//!
//! ```no_run
//! use std::path::Path;
//! use tokentrace_sdk::{Client, MemoryStore, summarize_bundles};
//!
//! let client = Client::new(MemoryStore::new());
//! let transcript = Path::new("/tmp/session.jsonl");
//!
//! let bundles = client.correlate_operations("session-1", Some(transcript));
//! let summary = summarize_bundles(&bundles);
//! println!(
//!     "{} bundles, {} tokens ({:.0}% exact)",
//!     summary.bundle_count,
//!     summary.tokens.total,
//!     summary.tokens.exact_ratio() * 100.0
//! );
//!
//! println!("peak context: {}", client.session_maximum_tokens(transcript));
//! println!("current context: {}", client.current_token_total(transcript));
//! ```
//!
//! # Architecture
//!
//! This SDK acts as a facade over:
//! - `tokentrace-types`: records, operations, bundles
//! - `tokentrace-transcript`: JSONL reading, classification, usage totals
//! - `tokentrace-store`: operation store access
//! - `tokentrace-engine`: correlation, ordering, sub-agent folding
//!
//! Diagnostics go through `tracing`; install a subscriber to see them.

pub mod client;
pub mod config;
pub mod error;

pub use client::{Client, ClientBuilder};
pub use config::{Config, StoreConfig, resolve_config_path};
pub use error::{Error, Result};

pub use tokentrace_engine::{
    BundleSummary, EngineOptions, TokenBreakdown, linked_operations, summarize_bundles,
};
pub use tokentrace_store::{
    MemoryStore, OperationKey, OperationStore, SnapshotStore, UnavailableStore,
};
pub use tokentrace_transcript::{
    Confidence, Measure, TokenReading, UsageScanConfig, get_current_token_total,
    get_session_maximum_tokens,
};
pub use tokentrace_types::{
    Allocation, Bundle, EstimationConfig, Operation, OperationKind, RawOperation, SubAgentInfo,
    TokenUsage, format_bytes, format_tokens,
};

use std::path::Path;

/// Correlate a session with default settings; see
/// [`Client::correlate_operations`].
pub fn correlate_operations(
    store: &dyn OperationStore,
    session_id: &str,
    transcript: Option<&Path>,
) -> Vec<Bundle> {
    match transcript {
        Some(path) => tokentrace_engine::correlate_operations(
            store,
            session_id,
            path,
            &EngineOptions::default(),
        ),
        None => Vec::new(),
    }
}
