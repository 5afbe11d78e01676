//! Error types for cardgraph.
//!
//! Only compute-path errors (`InvalidInput`) are meant to abort a caller's
//! operation. Remote labeling failures never reach callers as errors; they
//! degrade to default labels inside the labeling pipeline.

use thiserror::Error;

/// Unified error type for cardgraph.
///
/// All fallible functions return `Result<T, AppError>`.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Caller supplied arguments that can never succeed (empty id set, zero K)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Persisted key-value store errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Transport-level failures talking to the labeling endpoint
    #[error("LLM error: {0}")]
    Llm(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_input_message() {
        let err = AppError::InvalidInput("k must be at least 1".to_string());
        assert_eq!(err.to_string(), "Invalid input: k must be at least 1");
    }

    #[test]
    fn test_json_error_conversion() {
        let err: AppError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, AppError::Serialization(_)));
    }
}
