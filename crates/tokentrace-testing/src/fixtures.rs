//! Transcript fixtures.
//!
//! `TranscriptBuilder` writes JSONL transcripts in the wrapped record layout:
//! - plain user / assistant turns, with or without usage
//! - tool invocations and their results
//! - parent/child linking and sidechain (sub-agent) sections

use anyhow::Result;
use serde_json::{Map, Value, json};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokentrace_types::TokenUsage;
use uuid::Uuid;

/// Deterministic record uuid for a fixture id.
pub fn uuid_for(id: &str) -> String {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, id.as_bytes()).to_string()
}

/// Fluent JSONL transcript writer.
///
/// # Example
/// ```no_run
/// use tokentrace_testing::TranscriptBuilder;
///
/// let file = TranscriptBuilder::new()
///     .linked()
///     .user("u1", 100, "hello")
///     .assistant("a1", 200, "hi", None)
///     .write_temp()
///     .unwrap();
/// ```
#[derive(Debug, Clone, Default)]
pub struct TranscriptBuilder {
    lines: Vec<String>,
    linked: bool,
    sidechain: bool,
    last_uuid: Option<String>,
    next_parent: Option<Option<String>>,
}

impl TranscriptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Give every following record a uuid and chain it to the previous one.
    pub fn linked(mut self) -> Self {
        self.linked = true;
        self
    }

    /// Mark following records as sidechain records.
    pub fn sidechain(mut self) -> Self {
        self.sidechain = true;
        self
    }

    /// Mark following records as main-line records.
    pub fn main_line(mut self) -> Self {
        self.sidechain = false;
        self
    }

    /// Override the parent of the next record (`None` makes it a root).
    pub fn parent(mut self, parent_id: Option<&str>) -> Self {
        self.next_parent = Some(parent_id.map(uuid_for));
        self
    }

    pub fn user(self, id: &str, timestamp: i64, text: &str) -> Self {
        self.message(id, timestamp, None, json!({"role": "user", "content": text}))
    }

    pub fn assistant(
        self,
        id: &str,
        timestamp: i64,
        text: &str,
        usage: Option<TokenUsage>,
    ) -> Self {
        self.message(
            id,
            timestamp,
            usage,
            json!({
                "role": "assistant",
                "id": format!("msg_{id}"),
                "content": [{"type": "text", "text": text}]
            }),
        )
    }

    /// An assistant turn invoking one tool.
    pub fn tool_use(
        self,
        id: &str,
        timestamp: i64,
        tool_use_id: &str,
        name: &str,
        input: Value,
        usage: Option<TokenUsage>,
    ) -> Self {
        self.message(
            id,
            timestamp,
            usage,
            json!({
                "role": "assistant",
                "id": format!("msg_{id}"),
                "content": [{"type": "tool_use", "id": tool_use_id, "name": name, "input": input}]
            }),
        )
    }

    /// A `Task` delegation to a sub-agent.
    pub fn task(
        self,
        id: &str,
        timestamp: i64,
        tool_use_id: &str,
        prompt: &str,
        sub_agent_type: &str,
    ) -> Self {
        self.tool_use(
            id,
            timestamp,
            tool_use_id,
            "Task",
            json!({
                "description": "delegated task",
                "prompt": prompt,
                "subagent_type": sub_agent_type
            }),
            None,
        )
    }

    pub fn tool_result(self, id: &str, timestamp: i64, tool_use_id: &str, output: &str) -> Self {
        self.message(
            id,
            timestamp,
            None,
            json!({
                "role": "user",
                "content": [{"type": "tool_result", "tool_use_id": tool_use_id, "content": output}]
            }),
        )
    }

    /// A record carrying only a usage block.
    pub fn usage_only(self, id: &str, timestamp: i64, usage: TokenUsage) -> Self {
        self.record(id, timestamp, Some(usage), None)
    }

    pub fn system(mut self, id: &str, timestamp: i64, text: &str) -> Self {
        let (uuid, parent) = self.next_link(id);
        let mut content = Map::new();
        content.insert("type".to_string(), json!("system"));
        content.insert("text".to_string(), json!(text));
        insert_link(&mut content, uuid, parent);
        self.push(id, timestamp, None, content);
        self
    }

    /// Append a literal line, e.g. a truncated or malformed one.
    pub fn raw_line(mut self, line: &str) -> Self {
        self.lines.push(line.to_string());
        self
    }

    fn message(self, id: &str, timestamp: i64, usage: Option<TokenUsage>, message: Value) -> Self {
        self.record(id, timestamp, usage, Some(message))
    }

    fn record(
        mut self,
        id: &str,
        timestamp: i64,
        usage: Option<TokenUsage>,
        message: Option<Value>,
    ) -> Self {
        let (uuid, parent) = self.next_link(id);
        let mut content = Map::new();
        if let Some(message) = message {
            content.insert("message".to_string(), message);
        }
        insert_link(&mut content, uuid, parent);
        self.push(id, timestamp, usage, content);
        self
    }

    fn next_link(&mut self, id: &str) -> (Option<String>, Option<String>) {
        let explicit = self.next_parent.take();
        if !self.linked && explicit.is_none() {
            return (None, None);
        }
        let uuid = uuid_for(id);
        let parent = explicit.unwrap_or_else(|| self.last_uuid.clone());
        self.last_uuid = Some(uuid.clone());
        (Some(uuid), parent)
    }

    fn push(
        &mut self,
        id: &str,
        timestamp: i64,
        usage: Option<TokenUsage>,
        content: Map<String, Value>,
    ) {
        let mut line = json!({"id": id, "timestamp": timestamp, "content": content});
        if let Some(usage) = usage {
            line["usage"] = json!({
                "input_tokens": usage.input_tokens,
                "output_tokens": usage.output_tokens,
                "cache_creation_input_tokens": usage.cache_creation_input_tokens,
                "cache_read_input_tokens": usage.cache_read_input_tokens,
            });
        }
        if self.sidechain {
            line["isSidechain"] = json!(true);
        }
        self.lines.push(line.to_string());
    }

    pub fn build(&self) -> String {
        let mut out = self.lines.join("\n");
        if !out.is_empty() {
            out.push('\n');
        }
        out
    }

    pub fn write_to(&self, path: &Path) -> Result<PathBuf> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.build())?;
        Ok(path.to_path_buf())
    }

    pub fn write_temp(&self) -> Result<NamedTempFile> {
        let mut file = NamedTempFile::new()?;
        file.write_all(self.build().as_bytes())?;
        file.flush()?;
        Ok(file)
    }
}

fn insert_link(content: &mut Map<String, Value>, uuid: Option<String>, parent: Option<String>) {
    if let Some(uuid) = uuid {
        content.insert("uuid".to_string(), json!(uuid));
        content.insert("parentUuid".to_string(), json!(parent));
    }
}
