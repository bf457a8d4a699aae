use std::fmt;

/// Result type for tokentrace-store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the store layer
#[derive(Debug)]
pub enum Error {
    /// The backing store cannot be reached
    Unavailable(String),

    /// IO operation failed (snapshot files)
    Io(std::io::Error),

    /// Stored document or snapshot is not valid JSON
    Json(serde_json::Error),

    /// Key pattern could not be compiled
    Pattern(regex::Error),

    /// Key does not follow the operation key layout
    InvalidKey(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Unavailable(msg) => write!(f, "Operation store unavailable: {}", msg),
            Error::Io(err) => write!(f, "IO error: {}", err),
            Error::Json(err) => write!(f, "JSON error: {}", err),
            Error::Pattern(err) => write!(f, "Invalid key pattern: {}", err),
            Error::InvalidKey(key) => write!(f, "Invalid operation key: {}", key),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Json(err) => Some(err),
            Error::Pattern(err) => Some(err),
            Error::Unavailable(_) | Error::InvalidKey(_) => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}

impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Error::Pattern(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_message() {
        let err = Error::Unavailable("connection refused".to_string());
        assert_eq!(
            err.to_string(),
            "Operation store unavailable: connection refused"
        );
        assert!(std::error::Error::source(&err).is_none());
    }
}
