#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tempfile::TempDir;

use shortgen_media::{FixedDirections, PanDirection, RenderSettings};
use shortgen_models::{CompositionMedia, CompositionRequest, DataUri, ExecutionMode, ImageInput, MediaSource};
use shortgen_storage::{ArtifactStore, StorageError, StorageResult};
use shortgen_worker::{Composer, ComposerConfig};

pub const SRT: &str = "1\n00:00:00,000 --> 00:00:02,000\nFirst line\n\n2\n00:00:02,000 --> 00:00:04,500\nSecond line\n";

/// Scratch layout shared by one test.
pub struct Sandbox {
    pub dir: TempDir,
}

impl Sandbox {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn work_dir(&self) -> PathBuf {
        self.dir.path().join("work")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.dir.path().join("public").join("videos")
    }

    /// File the fake ffmpeg records its arguments in.
    pub fn args_log(&self) -> PathBuf {
        self.dir.path().join("ffmpeg-args.txt")
    }

    /// Fake ffmpeg that logs its arguments and writes its last one.
    pub fn succeeding_ffmpeg(&self) -> String {
        self.script(
            "ffmpeg-ok",
            &format!(
                "echo \"$@\" > '{}'\nfor last; do :; done\necho progress=end >&2\necho rendered > \"$last\"",
                self.args_log().display()
            ),
        )
    }

    /// Fake ffmpeg that logs its arguments and fails.
    pub fn failing_ffmpeg(&self) -> String {
        self.script(
            "ffmpeg-fail",
            &format!(
                "echo \"$@\" > '{}'\necho 'Error initializing complex filters' >&2\nexit 1",
                self.args_log().display()
            ),
        )
    }

    /// Fake ffmpeg that makes the work directory read-only and succeeds,
    /// so the workspace inside it can no longer be removed.
    pub fn locking_ffmpeg(&self) -> String {
        self.script(
            "ffmpeg-lock",
            "for last; do :; done\n\
             chmod 555 \"$(dirname \"$(dirname \"$last\")\")\"\n\
             echo rendered > \"$last\"",
        )
    }

    /// Fake ffmpeg that swaps the workspace directory for a plain file and
    /// fails, so removing the workspace fails even for root.
    pub fn displacing_ffmpeg(&self) -> String {
        self.script(
            "ffmpeg-displace",
            "for last; do :; done\n\
             ws=\"$(dirname \"$last\")\"\n\
             mv \"$ws\" \"$ws.moved\"\n\
             : > \"$ws\"\n\
             echo 'Conversion failed!' >&2\n\
             exit 1",
        )
    }

    /// Undo [`Sandbox::locking_ffmpeg`] so the sandbox can be dropped.
    pub fn unlock_work_dir(&self) {
        fs::set_permissions(self.work_dir(), fs::Permissions::from_mode(0o755)).unwrap();
    }

    /// Whether directory permissions are enforced for this user (not root).
    pub fn permissions_enforced(&self) -> bool {
        let locked = self.dir.path().join("locked");
        fs::create_dir(&locked).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o555)).unwrap();
        let enforced = fs::write(locked.join("marker"), b"x").is_err();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        fs::remove_dir_all(&locked).unwrap();
        enforced
    }

    fn script(&self, name: &str, body: &str) -> String {
        let path = self.dir.path().join(name);
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().to_string()
    }

    pub fn config(&self, ffmpeg: String, mode: ExecutionMode) -> ComposerConfig {
        ComposerConfig {
            work_dir: self.work_dir(),
            execution_mode: mode,
            render: RenderSettings {
                ffmpeg_path: ffmpeg,
                verify_output: false,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn local_mode(&self) -> ExecutionMode {
        ExecutionMode::Local {
            output_dir: self.output_dir(),
        }
    }

    /// Entries left in the work directory.
    pub fn leftover_workspaces(&self) -> usize {
        match fs::read_dir(self.work_dir()) {
            Ok(entries) => entries.count(),
            Err(_) => 0,
        }
    }
}

pub fn inline(mime: &str, bytes: &[u8]) -> MediaSource {
    MediaSource::Inline(DataUri::from_bytes(mime, bytes.to_vec()))
}

pub fn image_request(images: Vec<ImageInput>, audio_seconds: f64, captions: Option<&str>) -> CompositionRequest {
    CompositionRequest {
        audio: inline("audio/mpeg", b"ID3narration"),
        audio_duration_seconds: audio_seconds,
        caption_track: captions.map(str::to_string),
        media: CompositionMedia::Images { images },
    }
}

pub fn inline_images(count: usize) -> Vec<ImageInput> {
    (0..count)
        .map(|i| ImageInput::new(i as i64, inline("image/png", format!("png-{}", i).as_bytes())))
        .collect()
}

pub fn composer(config: ComposerConfig) -> Composer {
    Composer::new(config).unwrap().with_direction_picker(std::sync::Arc::new(
        FixedDirections::new(vec![PanDirection::TopLeft, PanDirection::BottomRight]),
    ))
}

/// Artifact store that copies published files into a directory.
pub struct DirectoryStore {
    pub root: PathBuf,
    pub published: Mutex<Vec<String>>,
    pub fail: bool,
}

impl DirectoryStore {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            published: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    pub fn failing(root: &Path) -> Self {
        Self {
            fail: true,
            ..Self::new(root)
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArtifactStore for DirectoryStore {
    async fn publish(&self, path: &Path, key: &str) -> StorageResult<String> {
        if self.fail {
            return Err(StorageError::upload_failed("bucket unavailable"));
        }
        let destination = self.root.join(key);
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(path, &destination).await?;
        self.published.lock().unwrap().push(key.to_string());
        Ok(format!("https://cdn.example.com/{}", key))
    }
}
