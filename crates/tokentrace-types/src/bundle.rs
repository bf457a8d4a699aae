use serde::{Deserialize, Serialize};

use crate::operation::Operation;

/// Metadata carried by a synthesised sub-agent bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubAgentInfo {
    /// Sub-agent role, e.g. "general-purpose" or "Explore".
    pub sub_agent_type: String,
    /// Id of the delegating tool invocation.
    pub parent_task_id: String,
    pub operation_count: usize,
    /// Last minus first operation timestamp, in milliseconds.
    pub duration_ms: i64,
}

/// One conversational turn or linked exchange: the unit the correlation
/// engine returns.
///
/// `total_tokens` always equals the sum of the contained operations' tokens;
/// construct through [`Bundle::new`] or call [`Bundle::recompute`] after
/// editing `operations`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bundle {
    pub id: String,
    /// Earliest timestamp among the operations.
    pub timestamp: i64,
    pub operations: Vec<Operation>,
    pub total_tokens: u64,
    #[serde(default)]
    pub is_sidechain: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_agent: Option<SubAgentInfo>,
}

impl Bundle {
    pub fn new(id: impl Into<String>, operations: Vec<Operation>, is_sidechain: bool) -> Self {
        let mut bundle = Self {
            id: id.into(),
            timestamp: 0,
            operations,
            total_tokens: 0,
            is_sidechain,
            sub_agent: None,
        };
        bundle.recompute();
        bundle
    }

    pub fn recompute(&mut self) {
        self.total_tokens = self
            .operations
            .iter()
            .fold(0u64, |sum, op| sum.saturating_add(op.tokens));
        self.timestamp = self
            .operations
            .iter()
            .map(|op| op.timestamp)
            .min()
            .unwrap_or(0);
    }

    pub fn is_sub_agent(&self) -> bool {
        self.sub_agent.is_some()
    }

    pub fn operation_count(&self) -> usize {
        self.operations.len()
    }
}
