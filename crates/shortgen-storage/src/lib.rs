//! Artifact storage for rendered videos.
//!
//! This crate provides:
//! - The [`ArtifactStore`] publish seam used by the composer
//! - A Cloudflare R2 (S3-compatible) client implementing it

pub mod client;
pub mod error;
pub mod store;

pub use client::{R2Client, R2Config};
pub use error::{StorageError, StorageResult};
pub use store::{content_type_for, validate_key, ArtifactStore};
