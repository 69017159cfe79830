//! Execution environment selection.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Where finished artifacts go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Upload to durable storage, then delete every local file
    Managed,
    /// Keep the artifact under `output_dir`; only intermediates are deleted
    Local { output_dir: PathBuf },
}

impl ExecutionMode {
    /// Parse the `managed` / `local` flag.
    pub fn from_flag(flag: &str, local_output_dir: impl Into<PathBuf>) -> ModelResult<Self> {
        match flag.trim().to_ascii_lowercase().as_str() {
            "managed" | "production" | "prod" => Ok(ExecutionMode::Managed),
            "local" | "development" | "dev" => Ok(ExecutionMode::Local {
                output_dir: local_output_dir.into(),
            }),
            other => Err(ModelError::validation(format!(
                "unknown execution mode '{}'",
                other
            ))),
        }
    }

    pub fn is_managed(&self) -> bool {
        matches!(self, ExecutionMode::Managed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::Managed => "managed",
            ExecutionMode::Local { .. } => "local",
        }
    }
}
