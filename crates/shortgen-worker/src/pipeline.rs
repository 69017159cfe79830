//! Composition pipeline.
//!
//! Image-mode requests run materialize → plan → compile → render → publish
//! inside a fresh workspace. The workspace is cleaned up before the result
//! is returned, whichever stage failed. Background-video requests are
//! forwarded to the [`BackgroundDispatcher`].

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::Instrument;

use shortgen_media::fs_utils::move_file;
use shortgen_media::{
    compile_render, plan_motion, plan_transitions, CompiledRender, DirectionPicker,
    RandomDirections, RenderArtifact, RenderExecutor, TimingPlan,
};
use shortgen_models::{CompositionMedia, CompositionRequest, ExecutionMode, ImageInput, JobId, MediaSource};
use shortgen_storage::ArtifactStore;

use crate::background::{artifact_key, BackgroundDispatcher};
use crate::config::ComposerConfig;
use crate::error::{ComposeError, ComposeResult};
use crate::logging::JobLogger;
use crate::materializer::AssetMaterializer;
use crate::metrics;
use crate::workspace::Workspace;

const OUTPUT_FILE_NAME: &str = "output.mp4";

/// A finished image-mode composition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionOutcome {
    pub job_id: JobId,
    /// Public URL (managed) or local file path (local)
    pub location: String,
    pub execution_mode: String,
    pub image_count: usize,
    pub duration_seconds: f64,
    pub size_bytes: u64,
}

/// Result of [`Composer::submit`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Submission {
    Rendered(CompositionOutcome),
    Dispatched { job_id: JobId },
}

/// Inputs of one image-mode composition.
#[derive(Debug, Clone, Copy)]
pub struct ImageComposition<'a> {
    pub audio: &'a MediaSource,
    pub audio_duration_seconds: f64,
    pub images: &'a [ImageInput],
    /// Non-blank SubRip text
    pub captions: Option<&'a str>,
}

impl<'a> ImageComposition<'a> {
    /// Borrow the image-mode parts of a request.
    pub fn from_request(request: &'a CompositionRequest) -> ComposeResult<Self> {
        match &request.media {
            CompositionMedia::Images { images } => Ok(Self {
                audio: &request.audio,
                audio_duration_seconds: request.audio_duration_seconds,
                images,
                captions: request.captions(),
            }),
            CompositionMedia::BackgroundVideo { .. } => Err(ComposeError::invalid_request(
                "background video requests are dispatched, not composed",
            )),
        }
    }
}

pub struct Composer {
    config: ComposerConfig,
    materializer: AssetMaterializer,
    executor: RenderExecutor,
    directions: Arc<dyn DirectionPicker>,
    store: Option<Arc<dyn ArtifactStore>>,
    dispatcher: Option<BackgroundDispatcher>,
}

impl Composer {
    pub fn new(config: ComposerConfig) -> ComposeResult<Self> {
        let materializer = AssetMaterializer::new(config.fetch_timeout)?;
        let executor = RenderExecutor::new(config.render.clone());
        Ok(Self {
            config,
            materializer,
            executor,
            directions: Arc::new(RandomDirections),
            store: None,
            dispatcher: None,
        })
    }

    /// Store used to publish in managed mode.
    pub fn with_artifact_store(mut self, store: Arc<dyn ArtifactStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_dispatcher(mut self, dispatcher: BackgroundDispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn with_direction_picker(mut self, directions: Arc<dyn DirectionPicker>) -> Self {
        self.directions = directions;
        self
    }

    pub fn config(&self) -> &ComposerConfig {
        &self.config
    }

    /// Wait for background dispatches still in flight.
    pub async fn shutdown(&self) {
        if let Some(dispatcher) = &self.dispatcher {
            dispatcher.drain().await;
        }
    }

    /// Validate and route a request by mode.
    pub async fn submit(&self, request: &CompositionRequest) -> ComposeResult<Submission> {
        let mode = request.media.mode_name();
        let result = self.route(request).await;
        metrics::record_composition(mode, metrics::outcome_label(&result));
        result
    }

    async fn route(&self, request: &CompositionRequest) -> ComposeResult<Submission> {
        request.validate()?;

        match &request.media {
            CompositionMedia::Images { .. } => {
                let job = ImageComposition::from_request(request)?;
                let outcome = self.compose(&JobId::new(), job).await?;
                Ok(Submission::Rendered(outcome))
            }
            CompositionMedia::BackgroundVideo { background_video } => {
                let dispatcher = self.dispatcher.as_ref().ok_or_else(|| {
                    ComposeError::config_error("no render worker configured for background video")
                })?;
                let job_id = dispatcher.dispatch(&request.audio, background_video).await?;
                Ok(Submission::Dispatched { job_id })
            }
        }
    }

    /// Run one image-mode composition end to end.
    pub async fn compose(
        &self,
        job_id: &JobId,
        job: ImageComposition<'_>,
    ) -> ComposeResult<CompositionOutcome> {
        let logger = JobLogger::new(job_id, "compose");
        logger.log_start(&format!(
            "{} images, {:.2}s audio, captions: {}",
            job.images.len(),
            job.audio_duration_seconds,
            job.captions.is_some()
        ));

        if self.config.execution_mode.is_managed() && self.store.is_none() {
            return Err(ComposeError::config_error(
                "managed execution requires an artifact store",
            ));
        }

        let workspace = Workspace::create(&self.config.work_dir).await?;
        let result = self
            .run(job_id, &workspace, job, &logger)
            .instrument(logger.span())
            .await;

        if !workspace.cleanup().await {
            logger.log_warning("workspace cleanup incomplete");
        }

        match &result {
            Ok(outcome) => logger.log_completion(&format!("published to {}", outcome.location)),
            Err(e) => logger.log_error(&format!("[{}] {}", e.category().as_str(), e)),
        }
        result
    }

    /// Materialize and compile without rendering, returning the FFmpeg
    /// arguments. The workspace is removed afterwards, so the paths in the
    /// arguments no longer exist.
    pub async fn plan(&self, request: &CompositionRequest) -> ComposeResult<Vec<String>> {
        request.validate()?;
        let job = ImageComposition::from_request(request)?;

        let workspace = Workspace::create(&self.config.work_dir).await?;
        let result = self
            .compile(&workspace, job)
            .await
            .map(|compiled| compiled.to_command(&self.config.render.encoding).build_args());
        workspace.cleanup().await;
        result
    }

    async fn compile(
        &self,
        workspace: &Workspace,
        job: ImageComposition<'_>,
    ) -> ComposeResult<CompiledRender> {
        let assets = self
            .materializer
            .materialize(workspace, job.audio, job.images, job.captions)
            .await?;

        let timing = TimingPlan::plan(assets.image_files.len(), job.audio_duration_seconds)?;
        let motions = plan_motion(&timing, self.directions.as_ref());
        let transitions = plan_transitions(&timing);

        let compiled = compile_render(
            &assets.render_assets(workspace.path(OUTPUT_FILE_NAME)),
            &timing,
            &motions,
            &transitions,
        )?;
        Ok(compiled)
    }

    async fn run(
        &self,
        job_id: &JobId,
        workspace: &Workspace,
        job: ImageComposition<'_>,
        logger: &JobLogger,
    ) -> ComposeResult<CompositionOutcome> {
        let compiled = self.compile(workspace, job).await?;
        logger.log_progress(&format!(
            "compiled {} filter chains",
            compiled.graph.chains().len()
        ));

        let started = Instant::now();
        let artifact = self.executor.render(&compiled).await?;
        metrics::record_render(started.elapsed().as_secs_f64());
        logger.log_progress(&format!("rendered {} bytes", artifact.size_bytes));

        let location = self.publish(job_id, &artifact).await?;

        Ok(CompositionOutcome {
            job_id: job_id.clone(),
            location,
            execution_mode: self.config.execution_mode.as_str().to_string(),
            image_count: compiled.image_inputs.len(),
            duration_seconds: job.audio_duration_seconds,
            size_bytes: artifact.size_bytes,
        })
    }

    async fn publish(&self, job_id: &JobId, artifact: &RenderArtifact) -> ComposeResult<String> {
        match &self.config.execution_mode {
            ExecutionMode::Managed => {
                let store = self.store.as_ref().ok_or_else(|| {
                    ComposeError::config_error("managed execution requires an artifact store")
                })?;
                Ok(store.publish(&artifact.path, &artifact_key(job_id)).await?)
            }
            ExecutionMode::Local { output_dir } => {
                let destination = output_dir.join(format!("{}.mp4", job_id));
                move_file(&artifact.path, &destination)
                    .await
                    .map_err(|e| ComposeError::PublishFailed(e.to_string()))?;
                Ok(destination.display().to_string())
            }
        }
    }
}
