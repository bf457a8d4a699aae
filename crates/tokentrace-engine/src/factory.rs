use std::collections::{HashMap, HashSet};

use sha2::{Digest, Sha256};
use tokentrace_store::RawOperationIndex;
use tokentrace_transcript::{AssistantPart, ClassifiedMessage, ToolResultPart, resolve};
use tokentrace_types::{
    Allocation, EstimationConfig, MessageContent, Operation, OperationKind, RawOperation,
    TokenUsage, TranscriptRecord,
};

/// Length of the content fingerprint used in de-duplication keys.
const FINGERPRINT_LEN: usize = 16;

/// Turns classified transcript records into attributed operations.
///
/// One factory is used per correlation run: it remembers which assistant
/// messages it has already converted and which tool names belong to which
/// tool-use ids.
pub struct OperationFactory<'a> {
    session_id: &'a str,
    index: &'a RawOperationIndex,
    estimation: EstimationConfig,
    seen: HashSet<String>,
    tool_names: HashMap<String, String>,
}

impl<'a> OperationFactory<'a> {
    pub fn new(
        session_id: &'a str,
        index: &'a RawOperationIndex,
        estimation: EstimationConfig,
    ) -> Self {
        Self {
            session_id,
            index,
            estimation,
            seen: HashSet::new(),
            tool_names: HashMap::new(),
        }
    }

    /// Operations for one record; empty for unknown records, empty user
    /// messages and repeated assistant messages.
    pub fn build(&mut self, record: &TranscriptRecord, elapsed_ms: u64) -> Vec<Operation> {
        let mut operations = match resolve(record) {
            ClassifiedMessage::System { size, .. } => vec![self.system(record, size)],
            ClassifiedMessage::User { text } if text.is_empty() => Vec::new(),
            ClassifiedMessage::User { text } => vec![self.user(record, &text)],
            ClassifiedMessage::ToolResponse { results } => results
                .iter()
                .map(|part| self.tool_response(record, part))
                .collect(),
            ClassifiedMessage::Assistant {
                message_id,
                parts,
                usage,
                content,
            } => self.assistant(record, message_id, &parts, usage, content),
            ClassifiedMessage::Unknown => Vec::new(),
        };

        for op in &mut operations {
            op.elapsed_ms = elapsed_ms;
        }
        operations
    }

    fn operation(&self, record: &TranscriptRecord, kind: OperationKind, tool: &str) -> Operation {
        let mut op = Operation::new(kind, tool, self.session_id, record.timestamp);
        op.message_id = record.message().and_then(|m| m.id.clone());
        op
    }

    fn system(&self, record: &TranscriptRecord, size: usize) -> Operation {
        let mut op = self
            .operation(record, OperationKind::System, "System")
            .with_estimate(self.estimation.tokens_for_bytes(size as u64));
        op.response_size = size as u64;
        op
    }

    fn user(&self, record: &TranscriptRecord, text: &str) -> Operation {
        let mut op = self
            .operation(record, OperationKind::User, "User")
            .with_estimate(self.estimation.tokens_for_text(text));
        op.response_size = text.len() as u64;
        op
    }

    fn tool_response(&self, record: &TranscriptRecord, part: &ToolResultPart<'_>) -> Operation {
        let message_id = record.message().and_then(|m| m.id.as_deref());
        let raw = self
            .index
            .find(Some(part.tool_use_id), message_id, record.timestamp);

        let tool = raw
            .map(|r| r.tool.as_str())
            .filter(|t| !t.is_empty())
            .or_else(|| self.tool_names.get(part.tool_use_id).map(String::as_str))
            .unwrap_or("ToolResult");

        let mut op = self.operation(record, OperationKind::ToolResponse, tool);
        op.tool_use_id = Some(part.tool_use_id.to_string());
        op.content_part_index = part.index;

        let size = raw.map_or(part.size() as u64, RawOperation::size_bytes);
        op.response_size = size;
        match raw {
            Some(raw) => {
                op.request = raw.request.clone();
                match &raw.usage {
                    Some(usage) => op.with_usage(usage),
                    None => op.with_estimate(self.estimation.tokens_for_bytes(size)),
                }
            }
            None => op.with_estimate(self.estimation.tokens_for_bytes(size)),
        }
    }

    fn assistant(
        &mut self,
        record: &TranscriptRecord,
        message_id: Option<&str>,
        parts: &[AssistantPart<'_>],
        usage: Option<TokenUsage>,
        content: Option<&MessageContent>,
    ) -> Vec<Operation> {
        let key = dedup_key(message_id.unwrap_or(&record.id), content);
        if !self.seen.insert(key) {
            tracing::debug!("Skipping repeated assistant message in record {}", record.id);
            return Vec::new();
        }

        for part in parts {
            if let AssistantPart::ToolUse { id, name, .. } = part {
                self.tool_names.insert(id.to_string(), name.to_string());
            }
        }

        let raw = self.index.find_for_turn(message_id, record.timestamp);
        let usage = usage.or_else(|| raw.and_then(|r| r.usage));

        if parts.is_empty() {
            let mut op = self.operation(record, OperationKind::Assistant, "Assistant");
            op.message_id = message_id.map(String::from);
            return vec![match usage {
                Some(usage) => op.with_usage(&usage),
                None => {
                    let size = raw.map_or(0, RawOperation::size_bytes);
                    op.response_size = size;
                    op.with_estimate(self.estimation.tokens_for_bytes(size))
                }
            }];
        }

        let mut operations: Vec<Operation> = parts
            .iter()
            .enumerate()
            .map(|(index, part)| {
                let mut op = self.operation(record, OperationKind::Assistant, part.label());
                op.message_id = message_id.map(String::from);
                op.content_part_index = index;
                op.response_size = part.size() as u64;
                if let AssistantPart::ToolUse { id, input, .. } = part {
                    op.tool_use_id = Some(id.to_string());
                    op.request = Some((*input).clone());
                }
                op
            })
            .collect();

        match usage {
            Some(usage) if operations.len() == 1 => {
                let op = operations.remove(0);
                vec![op.with_usage(&usage)]
            }
            Some(usage) => {
                let weights: Vec<u64> = operations.iter().map(|op| op.response_size).collect();
                let output = split_proportionally(usage.output_tokens, &weights);
                let growth = split_proportionally(usage.cache_creation_input_tokens, &weights);
                let shares = output.into_iter().zip(growth);
                for (op, (tokens, context_growth)) in operations.iter_mut().zip(shares) {
                    op.tokens = tokens;
                    op.generation_cost = tokens;
                    op.context_growth = context_growth;
                    op.allocation = Allocation::Proportional;
                }
                operations
            }
            None => {
                let single_raw = raw.filter(|_| operations.len() == 1);
                operations
                    .into_iter()
                    .map(|mut op| {
                        if let Some(raw) = single_raw {
                            op.response_size = raw.size_bytes();
                        }
                        let tokens = self.estimation.tokens_for_bytes(op.response_size);
                        op.with_estimate(tokens)
                    })
                    .collect()
            }
        }
    }
}

/// `{id}:{first 16 hex chars of sha256(content)}`.
fn dedup_key(id: &str, content: Option<&MessageContent>) -> String {
    let mut hasher = Sha256::new();
    if let Some(content) = content {
        match serde_json::to_vec(content) {
            Ok(bytes) => hasher.update(&bytes),
            Err(_) => hasher.update(content.text().as_bytes()),
        }
    }
    let digest = format!("{:x}", hasher.finalize());
    format!("{}:{}", id, &digest[..FINGERPRINT_LEN])
}

/// Split `total` across `weights`, rounding down and giving the remainder to
/// the last share so the shares always sum to `total`. All-zero weights
/// split evenly.
pub fn split_proportionally(total: u64, weights: &[u64]) -> Vec<u64> {
    if weights.is_empty() {
        return Vec::new();
    }
    let sum: u128 = weights.iter().map(|&w| w as u128).sum();
    let mut shares: Vec<u64> = if sum == 0 {
        vec![total / weights.len() as u64; weights.len()]
    } else {
        weights
            .iter()
            .map(|&w| (total as u128 * w as u128 / sum) as u64)
            .collect()
    };
    let assigned: u64 = shares.iter().sum();
    if let Some(last) = shares.last_mut() {
        *last += total - assigned;
    }
    shares
}
