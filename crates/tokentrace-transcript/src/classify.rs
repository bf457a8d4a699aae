use serde_json::Value;
use tokentrace_types::{ContentBlock, MessageContent, TokenUsage, TranscriptRecord};

/// Role label of a transcript record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    System,
    User,
    ToolResult,
    Assistant,
    Unknown,
}

impl MessageKind {
    /// Tool results travel in user-role messages.
    pub fn is_user_role(&self) -> bool {
        matches!(self, MessageKind::User | MessageKind::ToolResult)
    }
}

/// A record resolved into exactly the fields its role needs.
#[derive(Debug, Clone)]
pub enum ClassifiedMessage<'a> {
    System {
        payload: &'a Value,
        size: usize,
    },
    User {
        text: String,
    },
    ToolResponse {
        results: Vec<ToolResultPart<'a>>,
    },
    Assistant {
        message_id: Option<&'a str>,
        parts: Vec<AssistantPart<'a>>,
        usage: Option<TokenUsage>,
        content: Option<&'a MessageContent>,
    },
    Unknown,
}

impl ClassifiedMessage<'_> {
    pub fn kind(&self) -> MessageKind {
        match self {
            ClassifiedMessage::System { .. } => MessageKind::System,
            ClassifiedMessage::User { .. } => MessageKind::User,
            ClassifiedMessage::ToolResponse { .. } => MessageKind::ToolResult,
            ClassifiedMessage::Assistant { .. } => MessageKind::Assistant,
            ClassifiedMessage::Unknown => MessageKind::Unknown,
        }
    }
}

/// One `tool_result` block of a user-role message.
#[derive(Debug, Clone)]
pub struct ToolResultPart<'a> {
    /// Position of the block in the message content.
    pub index: usize,
    pub tool_use_id: &'a str,
    pub is_error: bool,
    pub block: &'a ContentBlock,
}

impl ToolResultPart<'_> {
    pub fn size(&self) -> usize {
        self.block.size_hint()
    }
}

/// One content part of an assistant turn.
#[derive(Debug, Clone)]
pub enum AssistantPart<'a> {
    Text(&'a str),
    Thinking(&'a str),
    ToolUse {
        id: &'a str,
        name: &'a str,
        input: &'a Value,
    },
}

impl AssistantPart<'_> {
    pub fn label(&self) -> &str {
        match self {
            AssistantPart::Text(_) => "Assistant",
            AssistantPart::Thinking(_) => "Thinking",
            AssistantPart::ToolUse { name, .. } => name,
        }
    }

    pub fn size(&self) -> usize {
        match self {
            AssistantPart::Text(text) | AssistantPart::Thinking(text) => text.len(),
            AssistantPart::ToolUse { name, input, .. } => {
                name.len() + serde_json::to_string(input).map_or(0, |s| s.len())
            }
        }
    }
}

/// Label a record. First matching rule wins:
///
/// 1. `content.type == "system"` → System
/// 2. user role carrying a `tool_result` block → ToolResult
/// 3. user role → User
/// 4. assistant role → Assistant
/// 5. no message but a usage block → Assistant (usage is only reported for
///    model responses)
/// 6. anything else → Unknown
pub fn classify(record: &TranscriptRecord) -> MessageKind {
    resolve(record).kind()
}

/// Classify and extract the role-specific fields in one step.
pub fn resolve(record: &TranscriptRecord) -> ClassifiedMessage<'_> {
    if record.content.kind.as_deref() == Some("system") {
        return ClassifiedMessage::System {
            payload: &record.content.payload,
            size: record.content.payload_size(),
        };
    }

    match record.message() {
        Some(message) if message.role == "user" => {
            if message.content.has_tool_result() {
                let results = message
                    .content
                    .blocks()
                    .iter()
                    .enumerate()
                    .filter_map(|(index, block)| match block {
                        ContentBlock::ToolResult {
                            tool_use_id,
                            is_error,
                            ..
                        } => Some(ToolResultPart {
                            index,
                            tool_use_id: tool_use_id.as_str(),
                            is_error: *is_error,
                            block,
                        }),
                        _ => None,
                    })
                    .collect();
                ClassifiedMessage::ToolResponse { results }
            } else {
                ClassifiedMessage::User {
                    text: message.content.text(),
                }
            }
        }
        Some(message) if message.role == "assistant" => ClassifiedMessage::Assistant {
            message_id: message.id.as_deref(),
            parts: assistant_parts(&message.content),
            usage: record.effective_usage(),
            content: Some(&message.content),
        },
        Some(_) => ClassifiedMessage::Unknown,
        None => match record.usage {
            Some(usage) => ClassifiedMessage::Assistant {
                message_id: None,
                parts: Vec::new(),
                usage: Some(usage),
                content: None,
            },
            None => ClassifiedMessage::Unknown,
        },
    }
}

fn assistant_parts(content: &MessageContent) -> Vec<AssistantPart<'_>> {
    match content {
        MessageContent::Text(text) if text.is_empty() => Vec::new(),
        MessageContent::Text(text) => vec![AssistantPart::Text(text)],
        MessageContent::Blocks(blocks) => blocks
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(AssistantPart::Text(text)),
                ContentBlock::Thinking { thinking } => Some(AssistantPart::Thinking(thinking)),
                ContentBlock::ToolUse { id, name, input } => Some(AssistantPart::ToolUse {
                    id,
                    name,
                    input,
                }),
                _ => None,
            })
            .collect(),
    }
}
