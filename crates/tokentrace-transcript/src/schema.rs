use chrono::DateTime;
use serde::Deserialize;
use serde_json::Value;
use tokentrace_types::{Message, RecordContent, TokenUsage, TranscriptRecord};

use crate::{Error, Result};

/// On-disk shape of a transcript line.
///
/// Two layouts are accepted: the wrapped layout (`id`, `timestamp`, `usage`,
/// `content: {type, uuid, parentUuid, message}`) and the host application's
/// native layout, where `type`, `uuid`, `parentUuid` and `message` sit at the
/// top level and `timestamp` is an RFC 3339 string.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireRecord {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    timestamp: Option<WireTimestamp>,
    #[serde(default)]
    usage: Option<TokenUsage>,
    #[serde(default)]
    content: Option<Value>,
    #[serde(default)]
    is_sidechain: Option<bool>,

    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    uuid: Option<String>,
    #[serde(default)]
    parent_uuid: Option<String>,
    #[serde(default)]
    message: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireTimestamp {
    Millis(i64),
    Fractional(f64),
    Text(String),
}

impl WireTimestamp {
    fn to_millis(&self) -> Option<i64> {
        match self {
            WireTimestamp::Millis(ms) => Some(*ms),
            WireTimestamp::Fractional(ms) => Some(*ms as i64),
            WireTimestamp::Text(text) => text.parse::<i64>().ok().or_else(|| {
                DateTime::parse_from_rfc3339(text)
                    .ok()
                    .map(|dt| dt.timestamp_millis())
            }),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireContent {
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    uuid: Option<String>,
    #[serde(default)]
    parent_uuid: Option<String>,
    #[serde(default)]
    message: Option<Value>,
    #[serde(default)]
    is_sidechain: Option<bool>,
}

/// Parse one transcript line into a record. `line` is the zero-based line
/// index, used for ordering and for ids of records that carry none.
pub fn parse_record(text: &str, line: usize) -> Result<TranscriptRecord> {
    let value: Value = serde_json::from_str(text)?;
    if !value.is_object() {
        return Err(Error::Parse(format!("line {} is not a JSON object", line)));
    }
    let wire = WireRecord::deserialize(&value)?;

    let (content, nested_sidechain) = match wire.content {
        Some(payload @ Value::Object(_)) => {
            let nested = WireContent::deserialize(&payload).unwrap_or_default();
            let content = RecordContent {
                kind: nested.kind,
                uuid: nested.uuid,
                parent_uuid: nested.parent_uuid,
                message: nested.message.as_ref().and_then(parse_message),
                payload,
            };
            (content, nested.is_sidechain)
        }
        _ => {
            let content = RecordContent {
                kind: wire.kind,
                uuid: wire.uuid,
                parent_uuid: wire.parent_uuid,
                message: wire.message.as_ref().and_then(parse_message),
                payload: wire.message.clone().unwrap_or(Value::Null),
            };
            (content, None)
        }
    };

    let id = wire
        .id
        .or_else(|| content.uuid.clone())
        .unwrap_or_else(|| format!("line-{}", line));

    let timestamp = match wire.timestamp.as_ref().and_then(WireTimestamp::to_millis) {
        Some(ts) => ts,
        None => {
            tracing::debug!("Record {} has no usable timestamp, using 0", id);
            0
        }
    };

    Ok(TranscriptRecord {
        id,
        line,
        timestamp,
        usage: wire.usage,
        content,
        is_sidechain: wire.is_sidechain.or(nested_sidechain).unwrap_or(false),
    })
}

fn parse_message(value: &Value) -> Option<Message> {
    match Message::deserialize(value) {
        Ok(message) => Some(message),
        Err(err) => {
            tracing::debug!("Ignoring unparseable message payload: {}", err);
            None
        }
    }
}

/// Usage block of a line, looked up at the top level, under `message`, and
/// under `content.message`. Returns `Ok(None)` for a well-formed line without
/// usage and `Err` for a line that is not valid JSON.
pub fn line_usage(text: &str) -> std::result::Result<Option<TokenUsage>, serde_json::Error> {
    #[derive(Deserialize)]
    struct MessageProbe {
        #[serde(default)]
        usage: Option<TokenUsage>,
    }

    #[derive(Deserialize)]
    struct ContentProbe {
        #[serde(default)]
        message: Option<MessageProbe>,
    }

    #[derive(Deserialize)]
    struct UsageProbe {
        #[serde(default)]
        usage: Option<TokenUsage>,
        #[serde(default)]
        message: Option<MessageProbe>,
        #[serde(default)]
        content: Option<Value>,
    }

    let probe: UsageProbe = serde_json::from_str(text)?;
    if probe.usage.is_some() {
        return Ok(probe.usage);
    }
    if let Some(usage) = probe.message.and_then(|m| m.usage) {
        return Ok(Some(usage));
    }
    Ok(probe
        .content
        .filter(Value::is_object)
        .and_then(|c| ContentProbe::deserialize(c).ok())
        .and_then(|c| c.message)
        .and_then(|m| m.usage))
}
