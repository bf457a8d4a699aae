use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

use crate::usage::TokenUsage;

/// How much the token figure on an [`Operation`] can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Allocation {
    /// Read directly from real usage counters.
    Exact,
    /// A known total split across several operations.
    Proportional,
    /// Derived from a size or length heuristic.
    Estimated,
}

impl Allocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Allocation::Exact => "exact",
            Allocation::Proportional => "proportional",
            Allocation::Estimated => "estimated",
        }
    }
}

/// Which kind of transcript record produced an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    System,
    User,
    ToolResponse,
    Assistant,
}

/// A normalised record of one message, tool invocation or tool response with
/// its attributed token cost.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    /// Display label: a tool name, or the role for plain messages.
    pub tool: String,
    pub kind: OperationKind,
    pub tokens: u64,
    /// Output tokens generated by the model.
    pub generation_cost: u64,
    /// Cache-creation tokens added to the context.
    pub context_growth: u64,
    pub allocation: Allocation,
    pub response_size: u64,
    pub timestamp: i64,
    /// Milliseconds since the previous transcript record.
    #[serde(default)]
    pub elapsed_ms: u64,
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_use_id: Option<String>,
    #[serde(default)]
    pub content_part_index: usize,
    /// Tool input for tool invocations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_agent_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl Operation {
    pub fn new(
        kind: OperationKind,
        tool: impl Into<String>,
        session_id: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            tool: tool.into(),
            kind,
            tokens: 0,
            generation_cost: 0,
            context_growth: 0,
            allocation: Allocation::Estimated,
            response_size: 0,
            timestamp,
            elapsed_ms: 0,
            session_id: session_id.into(),
            message_id: None,
            tool_use_id: None,
            content_part_index: 0,
            request: None,
            parent_task_id: None,
            sub_agent_type: None,
            details: None,
        }
    }

    /// Apply exact usage counters: output tokens become the cost and
    /// cache-creation tokens the context growth.
    pub fn with_usage(mut self, usage: &TokenUsage) -> Self {
        self.tokens = usage.output_tokens;
        self.generation_cost = usage.output_tokens;
        self.context_growth = usage.cache_creation_input_tokens;
        self.allocation = Allocation::Exact;
        self
    }

    pub fn with_estimate(mut self, tokens: u64) -> Self {
        self.tokens = tokens;
        self.allocation = Allocation::Estimated;
        self
    }
}

/// A tool-invocation record captured by instrumentation hooks and read back
/// from the operation store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawOperation {
    #[serde(default)]
    pub tool: String,
    #[serde(default, alias = "params", alias = "parameters")]
    pub request: Option<Value>,
    #[serde(default)]
    pub response: Option<Value>,
    /// Oversized responses are written to a side file and referenced here.
    #[serde(default, rename = "responseFile", alias = "response_file")]
    pub response_file: Option<PathBuf>,
    #[serde(default, rename = "responseSize", alias = "response_size")]
    pub response_size: Option<u64>,
    #[serde(default, alias = "messageId")]
    pub message_id: Option<String>,
    #[serde(default, alias = "toolUseId")]
    pub tool_use_id: Option<String>,
    #[serde(default)]
    pub usage: Option<TokenUsage>,
}

impl RawOperation {
    /// Response size in bytes: the recorded size, else the side file's
    /// length, else the length of the inline payload.
    pub fn size_bytes(&self) -> u64 {
        if let Some(size) = self.response_size {
            return size;
        }
        if let Some(path) = &self.response_file
            && let Ok(meta) = std::fs::metadata(path)
        {
            return meta.len();
        }
        self.response
            .as_ref()
            .map(|v| match v {
                Value::String(s) => s.len() as u64,
                other => serde_json::to_string(other).map_or(0, |s| s.len() as u64),
            })
            .unwrap_or(0)
    }

    /// Response text, following the file reference when the payload was
    /// stored out of line.
    pub fn response_text(&self) -> crate::Result<Option<String>> {
        if let Some(path) = &self.response_file {
            return Ok(Some(std::fs::read_to_string(path)?));
        }
        Ok(self.response.as_ref().map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }))
    }
}
