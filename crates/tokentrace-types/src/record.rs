use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::usage::TokenUsage;

/// One line of a session transcript, normalised from whichever layout the
/// host application wrote.
///
/// Records are immutable once read. `line` is the zero-based position of the
/// record in its file and is the tie-breaker wherever original order matters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptRecord {
    pub id: String,
    #[serde(default)]
    pub line: usize,
    /// Milliseconds since the Unix epoch. Not guaranteed to be monotonic.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    #[serde(default)]
    pub content: RecordContent,
    #[serde(default)]
    pub is_sidechain: bool,
}

impl TranscriptRecord {
    pub fn message(&self) -> Option<&Message> {
        self.content.message.as_ref()
    }

    pub fn role(&self) -> Option<&str> {
        self.message().map(|m| m.role.as_str())
    }

    pub fn uuid(&self) -> Option<&str> {
        self.content.uuid.as_deref()
    }

    pub fn parent_uuid(&self) -> Option<&str> {
        self.content.parent_uuid.as_deref()
    }

    /// Usage attached to the record, whether it sits at the top level or
    /// inside the `message` wrapper. The top-level block wins when both exist.
    pub fn effective_usage(&self) -> Option<TokenUsage> {
        self.usage.or_else(|| self.message().and_then(|m| m.usage))
    }

    /// Plain text of a user-role message, if this is one.
    pub fn user_text(&self) -> Option<String> {
        let message = self.message()?;
        (message.role == "user").then(|| message.content.text())
    }
}

/// The free-form `content` payload of a record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordContent {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    /// The untouched payload, kept for size-based estimates.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub payload: Value,
}

impl RecordContent {
    /// Serialized size of the original payload in bytes.
    pub fn payload_size(&self) -> usize {
        if self.payload.is_null() {
            return 0;
        }
        serde_json::to_string(&self.payload)
            .map(|s| s.len())
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub content: MessageContent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

/// Message body: either a bare string or a list of typed content blocks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl Default for MessageContent {
    fn default() -> Self {
        MessageContent::Text(String::new())
    }
}

impl MessageContent {
    /// Concatenated text of the message; text blocks are joined by newlines.
    pub fn text(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Blocks(blocks) => blocks
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    pub fn blocks(&self) -> &[ContentBlock] {
        match self {
            MessageContent::Text(_) => &[],
            MessageContent::Blocks(blocks) => blocks,
        }
    }

    pub fn has_tool_result(&self) -> bool {
        self.blocks()
            .iter()
            .any(|b| matches!(b, ContentBlock::ToolResult { .. }))
    }

    pub fn is_empty(&self) -> bool {
        match self {
            MessageContent::Text(text) => text.is_empty(),
            MessageContent::Blocks(blocks) => blocks.is_empty(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        #[serde(default)]
        text: String,
    },
    Thinking {
        #[serde(default)]
        thinking: String,
    },
    ToolUse {
        #[serde(default)]
        id: String,
        #[serde(default)]
        name: String,
        #[serde(default)]
        input: Value,
    },
    ToolResult {
        #[serde(default)]
        tool_use_id: String,
        #[serde(default)]
        content: Option<Value>,
        #[serde(default)]
        is_error: bool,
    },
    #[serde(other)]
    Unknown,
}

impl ContentBlock {
    /// Approximate size of the block's payload in bytes.
    pub fn size_hint(&self) -> usize {
        match self {
            ContentBlock::Text { text } => text.len(),
            ContentBlock::Thinking { thinking } => thinking.len(),
            ContentBlock::ToolUse { name, input, .. } => name.len() + json_len(input),
            ContentBlock::ToolResult { content, .. } => content.as_ref().map_or(0, json_len),
            ContentBlock::Unknown => 0,
        }
    }

    /// Text of a tool result, flattening the array-of-text-blocks form.
    pub fn result_text(&self) -> Option<String> {
        let ContentBlock::ToolResult { content, .. } = self else {
            return None;
        };
        Some(match content {
            None => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| item.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("\n"),
            Some(other) => other.to_string(),
        })
    }
}

fn json_len(value: &Value) -> usize {
    match value {
        Value::Null => 0,
        Value::String(s) => s.len(),
        other => serde_json::to_string(other).map(|s| s.len()).unwrap_or(0),
    }
}
