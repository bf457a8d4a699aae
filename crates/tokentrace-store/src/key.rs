use std::fmt;

use regex::Regex;

use crate::{Error, Result};

const PREFIX: &str = "session:";
const OPERATIONS: &str = ":operations:";
const SUFFIX: &str = ":response";

/// Address of one captured tool invocation:
/// `session:{session_id}:operations:{timestamp}:response`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationKey {
    pub session_id: String,
    pub timestamp: i64,
}

impl OperationKey {
    pub fn new(session_id: impl Into<String>, timestamp: i64) -> Self {
        Self {
            session_id: session_id.into(),
            timestamp,
        }
    }

    /// Glob pattern matching every operation key of a session.
    pub fn session_pattern(session_id: &str) -> String {
        format!("{PREFIX}{session_id}{OPERATIONS}*{SUFFIX}")
    }

    pub fn parse(key: &str) -> Result<Self> {
        let invalid = || Error::InvalidKey(key.to_string());

        let body = key
            .strip_prefix(PREFIX)
            .and_then(|rest| rest.strip_suffix(SUFFIX))
            .ok_or_else(invalid)?;
        // Session ids may themselves contain ':'; the timestamp never does.
        let split = body.rfind(OPERATIONS).ok_or_else(invalid)?;
        let session_id = &body[..split];
        let timestamp = body[split + OPERATIONS.len()..]
            .parse::<i64>()
            .map_err(|_| invalid())?;

        if session_id.is_empty() {
            return Err(invalid());
        }
        Ok(Self::new(session_id, timestamp))
    }
}

impl fmt::Display for OperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{PREFIX}{}{OPERATIONS}{}{SUFFIX}",
            self.session_id, self.timestamp
        )
    }
}

/// Compile a store glob (`*` any run, `?` one character) into an anchored
/// regex.
pub fn glob_to_regex(pattern: &str) -> Result<Regex> {
    let mut expr = String::with_capacity(pattern.len() + 8);
    expr.push('^');
    let mut literal = [0u8; 4];
    for ch in pattern.chars() {
        match ch {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            other => expr.push_str(&regex::escape(other.encode_utf8(&mut literal))),
        }
    }
    expr.push('$');
    Ok(Regex::new(&expr)?)
}
