//! Folding of delegated sub-agent runs into the main line.
//!
//! A delegation is an assistant tool use of `Task` (or `Agent`) whose input
//! carries the sub-agent `prompt`. The sub-agent's own turns are written to
//! the same transcript as sidechain records; the first of them is a user
//! message whose text is exactly that prompt. Everything reachable from that
//! entry record through `parentUuid` links forms the sub-agent run, which is
//! collapsed into one synthesised bundle placed right after the delegating
//! bundle.

use std::collections::{HashMap, HashSet, VecDeque};

use serde_json::Value;
use tokentrace_types::{
    Bundle, ContentBlock, Operation, OperationKind, SubAgentInfo, TranscriptRecord,
};

/// Tool names that start a sub-agent.
pub const DELEGATION_TOOLS: &[&str] = &["Task", "Agent"];

pub const DEFAULT_SUB_AGENT_TYPE: &str = "general-purpose";

/// A delegated task found in a main-line bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delegation {
    pub invocation_id: String,
    pub prompt: String,
    pub sub_agent_type: String,
}

impl Delegation {
    /// Recognise a delegating tool invocation.
    pub fn from_operation(op: &Operation) -> Option<Self> {
        if op.kind != OperationKind::Assistant || !DELEGATION_TOOLS.contains(&op.tool.as_str()) {
            return None;
        }
        let invocation_id = op.tool_use_id.clone()?;
        let request = op.request.as_ref()?;
        let prompt = request.get("prompt").and_then(Value::as_str)?.to_string();
        let sub_agent_type = request
            .get("subagent_type")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_SUB_AGENT_TYPE)
            .to_string();
        Some(Self {
            invocation_id,
            prompt,
            sub_agent_type,
        })
    }
}

/// Lookup tables over the raw records, built once per correlation run.
pub struct SubAgentProcessor<'a> {
    records: &'a [TranscriptRecord],
    sidechain_bundles: HashMap<&'a str, &'a Bundle>,
    children: HashMap<&'a str, Vec<usize>>,
    answered: HashSet<&'a str>,
    claimed: HashSet<usize>,
}

impl<'a> SubAgentProcessor<'a> {
    pub fn new(records: &'a [TranscriptRecord], sidechain: &'a [Bundle]) -> Self {
        let mut children: HashMap<&str, Vec<usize>> = HashMap::new();
        let mut answered = HashSet::new();
        for (i, record) in records.iter().enumerate() {
            if record.is_sidechain
                && let Some(parent) = record.parent_uuid()
            {
                children.entry(parent).or_default().push(i);
            }
            if let Some(message) = record.message() {
                for block in message.content.blocks() {
                    if let ContentBlock::ToolResult { tool_use_id, .. } = block {
                        answered.insert(tool_use_id.as_str());
                    }
                }
            }
        }

        Self {
            records,
            sidechain_bundles: sidechain.iter().map(|b| (b.id.as_str(), b)).collect(),
            children,
            answered,
            claimed: HashSet::new(),
        }
    }

    /// Main-line bundles with a sub-agent bundle spliced in after each
    /// bundle that delegated work, in delegation order.
    pub fn fold(&mut self, main: Vec<Bundle>) -> Vec<Bundle> {
        let mut folded = Vec::with_capacity(main.len());
        for bundle in main {
            let delegations: Vec<Delegation> = bundle
                .operations
                .iter()
                .filter_map(Delegation::from_operation)
                .collect();
            folded.push(bundle);
            for delegation in delegations {
                if let Some(sub_agent) = self.synthesize(&delegation) {
                    folded.push(sub_agent);
                }
            }
        }
        folded
    }

    /// Build the sub-agent bundle for one delegation, or `None` when the task
    /// never completed or left no sidechain turns.
    pub fn synthesize(&mut self, delegation: &Delegation) -> Option<Bundle> {
        if !self.answered.contains(delegation.invocation_id.as_str()) {
            tracing::debug!(
                "Delegation {} has no tool result yet",
                delegation.invocation_id
            );
            return None;
        }

        let entry = self.find_entry(&delegation.prompt)?;
        self.claimed.insert(entry);

        let mut operations: Vec<Operation> = self
            .reachable_from(entry)
            .into_iter()
            .filter_map(|i| self.sidechain_bundles.get(self.records[i].id.as_str()))
            .flat_map(|bundle| bundle.operations.iter().cloned())
            .map(|mut op| {
                op.parent_task_id = Some(delegation.invocation_id.clone());
                op.sub_agent_type = Some(delegation.sub_agent_type.clone());
                op
            })
            .collect();
        if operations.is_empty() {
            return None;
        }
        operations.sort_by_key(|op| op.timestamp);

        let first = operations.first().map_or(0, |op| op.timestamp);
        let last = operations.last().map_or(0, |op| op.timestamp);
        let mut bundle = Bundle::new(
            format!("{}-subagent", delegation.invocation_id),
            operations,
            true,
        );
        bundle.sub_agent = Some(SubAgentInfo {
            sub_agent_type: delegation.sub_agent_type.clone(),
            parent_task_id: delegation.invocation_id.clone(),
            operation_count: bundle.operations.len(),
            duration_ms: last.saturating_sub(first),
        });
        Some(bundle)
    }

    fn find_entry(&self, prompt: &str) -> Option<usize> {
        self.records.iter().enumerate().find_map(|(i, record)| {
            (record.is_sidechain
                && !self.claimed.contains(&i)
                && record.user_text().as_deref() == Some(prompt))
            .then_some(i)
        })
    }

    /// Breadth-first walk over sidechain children. The visited set makes
    /// self-references and cycles terminate.
    fn reachable_from(&self, entry: usize) -> Vec<usize> {
        let mut visited = HashSet::from([entry]);
        let mut queue = VecDeque::from([entry]);
        let mut reached = Vec::new();
        while let Some(i) = queue.pop_front() {
            reached.push(i);
            let Some(uuid) = self.records[i].uuid() else {
                continue;
            };
            for &child in self.children.get(uuid).into_iter().flatten() {
                if visited.insert(child) {
                    queue.push_back(child);
                }
            }
        }
        reached
    }
}

/// Fold sub-agent runs into `main`; see [`SubAgentProcessor::fold`].
pub fn fold_sub_agents(
    main: Vec<Bundle>,
    sidechain: &[Bundle],
    records: &[TranscriptRecord],
) -> Vec<Bundle> {
    SubAgentProcessor::new(records, sidechain).fold(main)
}
