use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Token counters reported by the model for one response.
///
/// All four counters are independent and optional on the wire; missing,
/// `null` or negative values read as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default, deserialize_with = "deserialize_count")]
    pub input_tokens: u64,
    #[serde(default, deserialize_with = "deserialize_count")]
    pub output_tokens: u64,
    #[serde(default, deserialize_with = "deserialize_count")]
    pub cache_creation_input_tokens: u64,
    #[serde(default, deserialize_with = "deserialize_count")]
    pub cache_read_input_tokens: u64,
}

impl TokenUsage {
    pub fn new(input: u64, output: u64, cache_creation: u64, cache_read: u64) -> Self {
        Self {
            input_tokens: input,
            output_tokens: output,
            cache_creation_input_tokens: cache_creation,
            cache_read_input_tokens: cache_read,
        }
    }

    /// Sum of all four counters.
    pub fn total(&self) -> u64 {
        self.input_tokens
            .saturating_add(self.output_tokens)
            .saturating_add(self.cache_creation_input_tokens)
            .saturating_add(self.cache_read_input_tokens)
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

fn deserialize_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f > 0.0).map(|f| f as u64))
            .unwrap_or(0),
        _ => 0,
    })
}
