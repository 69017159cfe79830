//! Job identifiers and background job records.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a composition request or background job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status of a background rendering job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Dispatched to the render worker
    #[default]
    Processing,
    /// Render worker reported success
    Completed,
    /// Dispatch or rendering failed
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Persisted record of a background-video job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobRecord {
    pub id: JobId,
    pub status: JobStatus,
    pub audio_url: String,
    pub background_url: String,
    /// Storage key the render worker writes to
    pub output_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// New record in the `processing` state.
    pub fn processing(
        id: JobId,
        audio_url: impl Into<String>,
        background_url: impl Into<String>,
        output_path: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: JobStatus::Processing,
            audio_url: audio_url.into(),
            background_url: background_url.into(),
            output_path: output_path.into(),
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Mark as failed with a reason.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.status = JobStatus::Failed;
        self.error = Some(error.into());
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_id_unique() {
        assert_ne!(JobId::new(), JobId::new());
    }

    #[test]
    fn test_job_status_serde() {
        let json = serde_json::to_string(&JobStatus::Processing).unwrap();
        assert_eq!(json, "\"processing\"");
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn test_record_fail() {
        let mut record = JobRecord::processing(
            JobId::from_string("job-1"),
            "https://a",
            "https://b",
            "videos/job-1.mp4",
        );
        assert_eq!(record.status, JobStatus::Processing);

        record.fail("worker unreachable");
        assert_eq!(record.status, JobStatus::Failed);
        assert_eq!(record.error.as_deref(), Some("worker unreachable"));
        assert!(record.updated_at >= record.created_at);
    }
}
