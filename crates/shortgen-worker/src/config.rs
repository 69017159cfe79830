//! Composer configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use shortgen_media::command::DEFAULT_MAX_DIAGNOSTIC_BYTES;
use shortgen_media::RenderSettings;
use shortgen_models::ExecutionMode;

use crate::error::{ComposeError, ComposeResult};

/// Composer configuration.
#[derive(Debug, Clone)]
pub struct ComposerConfig {
    /// Parent of the per-request scratch directories
    pub work_dir: PathBuf,
    /// Where finished videos go
    pub execution_mode: ExecutionMode,
    /// FFmpeg/FFprobe binaries and encoding
    pub render: RenderSettings,
    /// Per-image HTTP fetch timeout
    pub fetch_timeout: Duration,
    /// Base URL of the background-video render worker
    pub render_worker_url: Option<String>,
    /// `maxDuration` sent with background-video jobs
    pub background_max_duration_secs: u32,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("/tmp/shortgen"),
            execution_mode: ExecutionMode::Managed,
            render: RenderSettings::default(),
            fetch_timeout: Duration::from_secs(30),
            render_worker_url: None,
            background_max_duration_secs: 60,
        }
    }
}

impl ComposerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> ComposeResult<Self> {
        let defaults = Self::default();

        let local_output_dir = std::env::var("SHORTGEN_LOCAL_OUTPUT_DIR")
            .unwrap_or_else(|_| "./public/videos".to_string());
        let execution_mode = match std::env::var("SHORTGEN_EXECUTION_MODE") {
            Ok(flag) => ExecutionMode::from_flag(&flag, local_output_dir)
                .map_err(|e| ComposeError::config_error(e.to_string()))?,
            Err(_) => defaults.execution_mode,
        };

        let render = RenderSettings {
            ffmpeg_path: std::env::var("SHORTGEN_FFMPEG_PATH")
                .unwrap_or(defaults.render.ffmpeg_path),
            ffprobe_path: std::env::var("SHORTGEN_FFPROBE_PATH")
                .unwrap_or(defaults.render.ffprobe_path),
            verify_output: env_or("SHORTGEN_VERIFY_OUTPUT", defaults.render.verify_output),
            max_diagnostic_bytes: env_or(
                "SHORTGEN_MAX_DIAGNOSTIC_BYTES",
                DEFAULT_MAX_DIAGNOSTIC_BYTES,
            ),
            encoding: defaults.render.encoding,
        };

        Ok(Self {
            work_dir: std::env::var("SHORTGEN_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            execution_mode,
            render,
            fetch_timeout: Duration::from_secs(env_or("SHORTGEN_FETCH_TIMEOUT_SECS", 30)),
            render_worker_url: std::env::var("SHORTGEN_RENDER_WORKER_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            background_max_duration_secs: env_or("SHORTGEN_BACKGROUND_MAX_DURATION_SECS", 60),
        })
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}
