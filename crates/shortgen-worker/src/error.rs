//! Composition error types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type ComposeResult<T> = Result<T, ComposeError>;

/// Coarse failure class reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    /// The request itself is unusable
    InvalidInput,
    /// Fetching, compiling or running the render failed
    Rendering,
    /// The artifact could not be published
    Storage,
}

impl FailureCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureCategory::InvalidInput => "invalid_input",
            FailureCategory::Rendering => "rendering",
            FailureCategory::Storage => "storage",
        }
    }
}

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Image fetch failed for {url}: {message}")]
    FetchFailed { url: String, message: String },

    #[error("Dispatch failed: {0}")]
    DispatchFailed(String),

    #[error("Job store error: {0}")]
    JobStore(String),

    #[error("Publish failed: {0}")]
    PublishFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("{0}")]
    Model(#[from] shortgen_models::ModelError),

    #[error("Media error: {0}")]
    Media(#[from] shortgen_media::MediaError),

    #[error("Storage error: {0}")]
    Storage(#[from] shortgen_storage::StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ComposeError {
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn fetch_failed(url: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::FetchFailed {
            url: url.into(),
            message: msg.into(),
        }
    }

    pub fn dispatch_failed(msg: impl Into<String>) -> Self {
        Self::DispatchFailed(msg.into())
    }

    pub fn job_store(msg: impl Into<String>) -> Self {
        Self::JobStore(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Map to the category surfaced to callers.
    pub fn category(&self) -> FailureCategory {
        match self {
            ComposeError::InvalidRequest(_) | ComposeError::Model(_) => {
                FailureCategory::InvalidInput
            }
            ComposeError::Media(e) if e.is_input_error() => FailureCategory::InvalidInput,
            ComposeError::Storage(_) | ComposeError::PublishFailed(_) => FailureCategory::Storage,
            ComposeError::FetchFailed { .. }
            | ComposeError::DispatchFailed(_)
            | ComposeError::JobStore(_)
            | ComposeError::ConfigError(_)
            | ComposeError::Media(_)
            | ComposeError::Io(_) => FailureCategory::Rendering,
        }
    }

    /// FFmpeg diagnostics, when the failure came from a render.
    pub fn diagnostics(&self) -> Option<&str> {
        match self {
            ComposeError::Media(e) => e.diagnostics(),
            _ => None,
        }
    }
}
