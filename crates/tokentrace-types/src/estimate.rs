use serde::{Deserialize, Serialize};

/// Heuristics used wherever no real usage counters exist.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimationConfig {
    /// Characters (or bytes, for payloads) per token.
    pub chars_per_token: f64,
    /// Bytes per token used for whole-file fallback estimates.
    pub bytes_per_token: u64,
}

impl Default for EstimationConfig {
    fn default() -> Self {
        Self {
            chars_per_token: 3.7,
            bytes_per_token: 100,
        }
    }
}

impl EstimationConfig {
    /// `ceil(chars / chars_per_token)`.
    pub fn tokens_for_chars(&self, chars: usize) -> u64 {
        if chars == 0 || self.chars_per_token <= 0.0 {
            return 0;
        }
        (chars as f64 / self.chars_per_token).ceil() as u64
    }

    pub fn tokens_for_text(&self, text: &str) -> u64 {
        self.tokens_for_chars(text.chars().count())
    }

    pub fn tokens_for_bytes(&self, bytes: u64) -> u64 {
        self.tokens_for_chars(bytes as usize)
    }

    /// Low-confidence estimate for a whole transcript file.
    pub fn tokens_for_file_size(&self, file_size: u64) -> u64 {
        file_size / self.bytes_per_token.max(1)
    }
}
