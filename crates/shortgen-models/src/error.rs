//! Model validation errors.

use thiserror::Error;

/// Result type for model parsing and validation.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised while parsing or validating request data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("Invalid data URI: {0}")]
    InvalidDataUri(String),

    #[error("Unsupported media source: {0}")]
    UnsupportedSource(String),

    #[error("Invalid request: {0}")]
    Validation(String),
}

impl ModelError {
    pub fn invalid_data_uri(msg: impl Into<String>) -> Self {
        Self::InvalidDataUri(msg.into())
    }

    pub fn unsupported_source(msg: impl Into<String>) -> Self {
        Self::UnsupportedSource(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
