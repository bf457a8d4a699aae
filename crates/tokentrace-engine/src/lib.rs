// Engine module - correlation and token accounting
// Sits between the transcript/store layers and the SDK facade

mod correlate;
pub mod enrich;
pub mod factory;
pub mod ordering;
pub mod subagent;
pub mod summary;

pub use correlate::{EngineOptions, correlate_operations, correlate_records, linked_operations};
pub use enrich::enrich_details;
pub use factory::{OperationFactory, split_proportionally};
pub use ordering::{depth_first_order, has_parent_graph, order_bundles};
pub use subagent::{Delegation, SubAgentProcessor, fold_sub_agents};
pub use summary::{BundleSummary, TokenBreakdown, summarize_bundles};
