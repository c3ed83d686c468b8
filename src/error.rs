//! Error types for docstream.
//!
//! Graceful early termination is not an error: steps report it through
//! `Flow::Close` and callbacks through `ControlFlow::Break`.

use thiserror::Error;

/// Stream execution error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StreamError {
    #[error("Evaluation error: {0}")]
    EvaluationError(String),

    #[error("Type error: {0}")]
    TypeError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid pipeline: {0}")]
    InvalidPipeline(String),

    #[error("Limit exceeded: {0}")]
    LimitExceeded(String),

    #[error("Config error: {0}")]
    ConfigError(String),
}

/// Result type for stream operations
pub type StreamResult<T> = Result<T, StreamError>;

impl serde::Serialize for StreamError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl From<toml::de::Error> for StreamError {
    fn from(err: toml::de::Error) -> Self {
        StreamError::ConfigError(err.to_string())
    }
}
