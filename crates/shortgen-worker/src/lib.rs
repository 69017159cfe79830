//! Short-video composition pipeline.
//!
//! This crate provides:
//! - Asset materialization into per-request workspaces
//! - The `Composer` pipeline (materialize, plan, compile, render, publish)
//! - Background-video dispatch to an external render worker
//! - Job record stores (REST table and in-memory)
//! - Configuration, structured job logging and metrics

pub mod background;
pub mod config;
pub mod error;
pub mod jobs;
pub mod logging;
pub mod materializer;
pub mod metrics;
pub mod pipeline;
pub mod workspace;

pub use background::{artifact_key, BackgroundDispatcher, RenderDispatch};
pub use config::ComposerConfig;
pub use error::{ComposeError, ComposeResult, FailureCategory};
pub use jobs::{JobStore, MemoryJobStore, RestJobStore, RestJobStoreConfig};
pub use logging::JobLogger;
pub use materializer::{AssetMaterializer, WorkspaceAssets};
pub use pipeline::{Composer, CompositionOutcome, ImageComposition, Submission};
pub use workspace::Workspace;
