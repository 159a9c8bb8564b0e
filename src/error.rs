//! Error types for shopsync.

use thiserror::Error;

/// Crate-level error type.
#[derive(Debug, Error)]
pub enum ShopsyncError {
    /// Configuration could not be read, parsed, or is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// `SQLite` access failed.
    #[error("Database error: {0}")]
    Database(String),

    /// A key-value backend failed to read or write.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Requested item does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Input could not be parsed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// HTTP transport failure.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for ShopsyncError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e.to_string())
    }
}

impl From<rusqlite::Error> for ShopsyncError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(e.to_string())
    }
}

impl From<reqwest::Error> for ShopsyncError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ShopsyncError::NotFound("operation 42".to_string());
        assert_eq!(err.to_string(), "Not found: operation 42");
    }

    #[test]
    fn test_json_error_maps_to_parse() {
        let err: ShopsyncError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, ShopsyncError::Parse(_)));
    }
}
