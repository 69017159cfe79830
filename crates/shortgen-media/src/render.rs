//! Render execution.

use std::path::PathBuf;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use shortgen_models::EncodingConfig;

use crate::command::{FfmpegRunner, DEFAULT_MAX_DIAGNOSTIC_BYTES};
use crate::compiler::CompiledRender;
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::file_size;
use crate::probe::probe_media;

/// Binaries and output checks for rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderSettings {
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    /// Probe the output and require a video stream
    pub verify_output: bool,
    pub max_diagnostic_bytes: usize,
    pub encoding: EncodingConfig,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            verify_output: true,
            max_diagnostic_bytes: DEFAULT_MAX_DIAGNOSTIC_BYTES,
            encoding: EncodingConfig::default(),
        }
    }
}

/// A finished render on local disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderArtifact {
    pub path: PathBuf,
    pub duration_cap_seconds: f64,
    pub size_bytes: u64,
    pub elapsed_ms: u64,
}

/// Runs compiled renders through FFmpeg.
#[derive(Debug, Clone)]
pub struct RenderExecutor {
    settings: RenderSettings,
    runner: FfmpegRunner,
}

impl RenderExecutor {
    pub fn new(settings: RenderSettings) -> Self {
        let runner = FfmpegRunner::new()
            .with_binary(settings.ffmpeg_path.clone())
            .with_max_diagnostic_bytes(settings.max_diagnostic_bytes);
        Self { settings, runner }
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// Run the single FFmpeg pass and check its output.
    ///
    /// Runs to completion; there is no timeout.
    pub async fn render(&self, compiled: &CompiledRender) -> MediaResult<RenderArtifact> {
        let started = Instant::now();
        let cmd = compiled.to_command(&self.settings.encoding);
        let total = compiled.duration_cap_seconds;

        info!(
            output = %compiled.output_path.display(),
            images = compiled.image_inputs.len(),
            captions = compiled.has_caption_stage(),
            duration_cap = total,
            "Starting render"
        );

        self.runner
            .run_with_progress(&cmd, move |progress| {
                debug!(
                    percent = format!("{:.1}", progress.percent_of(total)),
                    frame = progress.frame,
                    speed = progress.speed,
                    "Render progress"
                );
            })
            .await?;

        let size_bytes = match file_size(&compiled.output_path).await {
            Some(size) if size > 0 => size,
            _ => return Err(MediaError::OutputMissing(compiled.output_path.clone())),
        };

        if self.settings.verify_output {
            let info = probe_media(&self.settings.ffprobe_path, &compiled.output_path).await?;
            if !info.has_video {
                return Err(MediaError::InvalidVideo(format!(
                    "{} has no video stream",
                    compiled.output_path.display()
                )));
            }
        }

        let elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            output = %compiled.output_path.display(),
            size_bytes,
            elapsed_ms,
            "Render finished"
        );

        Ok(RenderArtifact {
            path: compiled.output_path.clone(),
            duration_cap_seconds: total,
            size_bytes,
            elapsed_ms,
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::compiler::{compile_render, RenderAssets};
    use crate::motion::{plan_motion, plan_transitions, FixedDirections};
    use crate::timing::TimingPlan;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;
    use tempfile::TempDir;

    fn script(dir: &Path, name: &str, body: &str) -> String {
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().to_string()
    }

    fn compiled(dir: &Path) -> CompiledRender {
        let image = dir.join("image_000.png");
        let audio = dir.join("narration.mp3");
        fs::write(&image, b"png").unwrap();
        fs::write(&audio, b"mp3").unwrap();

        let assets = RenderAssets {
            image_files: vec![image],
            audio_file: audio,
            caption_file: None,
            output_path: dir.join("output.mp4"),
        };
        let timing = TimingPlan::plan(1, 3.0).unwrap();
        let motions = plan_motion(&timing, &FixedDirections::new(vec![]));
        compile_render(&assets, &timing, &motions, &plan_transitions(&timing)).unwrap()
    }

    fn executor(ffmpeg: String) -> RenderExecutor {
        RenderExecutor::new(RenderSettings {
            ffmpeg_path: ffmpeg,
            verify_output: false,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_render_writes_artifact() {
        let dir = TempDir::new().unwrap();
        let ffmpeg = script(
            dir.path(),
            "ffmpeg",
            "for last; do :; done\necho progress=end >&2\necho fake > \"$last\"",
        );

        let artifact = executor(ffmpeg).render(&compiled(dir.path())).await.unwrap();
        assert_eq!(artifact.path, dir.path().join("output.mp4"));
        assert!(artifact.size_bytes > 0);
        assert!((artifact.duration_cap_seconds - 3.1).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_render_failure_keeps_diagnostics() {
        let dir = TempDir::new().unwrap();
        let ffmpeg = script(
            dir.path(),
            "ffmpeg",
            "echo 'No such filter: zoompan' >&2\nexit 1",
        );

        let err = executor(ffmpeg)
            .render(&compiled(dir.path()))
            .await
            .unwrap_err();
        match &err {
            MediaError::FfmpegFailed { exit_code, .. } => assert_eq!(*exit_code, Some(1)),
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(err.diagnostics().unwrap().contains("No such filter"));
    }

    #[tokio::test]
    async fn test_non_utf8_stderr_does_not_kill_render() {
        let dir = TempDir::new().unwrap();
        let ffmpeg = script(
            dir.path(),
            "ffmpeg",
            "for last; do :; done\n\
             printf 'Input title: caf\\351\\n' >&2\n\
             sleep 0.2\n\
             i=0\n\
             while [ $i -lt 50 ]; do echo \"frame=$i\" >&2; i=$((i+1)); done\n\
             echo fake > \"$last\"",
        );

        let artifact = executor(ffmpeg).render(&compiled(dir.path())).await.unwrap();
        assert!(artifact.size_bytes > 0);
    }

    #[tokio::test]
    async fn test_non_utf8_stderr_kept_in_diagnostics() {
        let dir = TempDir::new().unwrap();
        let ffmpeg = script(
            dir.path(),
            "ffmpeg",
            "printf 'Input title: caf\\351\\n' >&2\n\
             echo 'Invalid data found when processing input' >&2\n\
             exit 1",
        );

        let err = executor(ffmpeg)
            .render(&compiled(dir.path()))
            .await
            .unwrap_err();
        let diagnostics = err.diagnostics().unwrap();
        assert!(diagnostics.contains("Input title: caf\u{fffd}"));
        assert!(diagnostics.contains("Invalid data found"));
    }

    #[tokio::test]
    async fn test_empty_output_is_rejected() {
        let dir = TempDir::new().unwrap();
        let ffmpeg = script(dir.path(), "ffmpeg", "for last; do :; done\n: > \"$last\"");

        let err = executor(ffmpeg)
            .render(&compiled(dir.path()))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::OutputMissing(_)));
    }
}
