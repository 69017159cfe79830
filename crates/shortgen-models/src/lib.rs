//! Shared data models for the shortgen composition pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Composition requests (image mode and background-video mode)
//! - Inline (data URI) and remote media references
//! - Job identifiers and background job records
//! - Execution mode and fixed encoding/geometry constants

pub mod encoding;
pub mod error;
pub mod execution;
pub mod job;
pub mod media_source;
pub mod request;

// Re-export common types
pub use encoding::EncodingConfig;
pub use error::{ModelError, ModelResult};
pub use execution::ExecutionMode;
pub use job::{JobId, JobRecord, JobStatus};
pub use media_source::{DataUri, MediaSource};
pub use request::{CompositionMedia, CompositionRequest, ImageInput};
