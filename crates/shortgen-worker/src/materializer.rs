//! Asset materialization.
//!
//! Turns the request's audio, images and captions into files inside the
//! request workspace:
//!
//! ```text
//! <workspace>/narration.<ext>
//! <workspace>/image_000.<ext>, image_001.<ext>, ...   (display order)
//! <workspace>/captions.srt                            (only with captions)
//! ```
//!
//! Remote images are fetched concurrently. The first failure drops the
//! remaining fetches and fails the whole request.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::future::try_join_all;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tracing::{debug, info};
use url::Url;

use shortgen_media::{CaptionTrack, RenderAssets};
use shortgen_models::media_source::extension_for_mime;
use shortgen_models::{DataUri, ImageInput, MediaSource};

use crate::error::{ComposeError, ComposeResult};
use crate::metrics;
use crate::workspace::Workspace;

const DEFAULT_AUDIO_EXTENSION: &str = "mp3";
const DEFAULT_IMAGE_EXTENSION: &str = "png";
const CAPTION_FILE_NAME: &str = "captions.srt";

/// Local copies of a request's assets.
#[derive(Debug, Clone)]
pub struct WorkspaceAssets {
    pub root: PathBuf,
    pub audio_file: PathBuf,
    pub caption_file: Option<PathBuf>,
    /// In display order
    pub image_files: Vec<PathBuf>,
}

impl WorkspaceAssets {
    /// Inputs for the render compiler, writing to `output_path`.
    pub fn render_assets(&self, output_path: PathBuf) -> RenderAssets {
        RenderAssets {
            image_files: self.image_files.clone(),
            audio_file: self.audio_file.clone(),
            caption_file: self.caption_file.clone(),
            output_path,
        }
    }
}

/// Resolves request assets into workspace files.
#[derive(Debug, Clone)]
pub struct AssetMaterializer {
    client: Client,
}

impl AssetMaterializer {
    pub fn new(fetch_timeout: Duration) -> ComposeResult<Self> {
        let client = Client::builder()
            .timeout(fetch_timeout)
            .build()
            .map_err(|e| ComposeError::config_error(format!("HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Write every asset into `workspace`.
    ///
    /// `captions` must already be non-blank; it is checked to be a parseable
    /// SubRip track before anything is written.
    pub async fn materialize(
        &self,
        workspace: &Workspace,
        audio: &MediaSource,
        images: &[ImageInput],
        captions: Option<&str>,
    ) -> ComposeResult<WorkspaceAssets> {
        if images.is_empty() {
            return Err(ComposeError::invalid_request(
                "image mode requires at least one image",
            ));
        }
        if let Some(track) = captions {
            let parsed = CaptionTrack::parse(track)?;
            debug!(cues = parsed.cues().len(), "Caption track validated");
        }

        let audio = audio.as_inline().ok_or_else(|| {
            ComposeError::invalid_request(format!(
                "audio must be an inline data URI, got {}",
                audio.describe()
            ))
        })?;
        let audio_file = write_audio(workspace, audio).await?;

        let ordered = ImageInput::in_display_order(images);
        let image_files = try_join_all(
            ordered
                .iter()
                .enumerate()
                .map(|(index, image)| self.materialize_image(workspace.root(), index, &image.source)),
        )
        .await?;

        let caption_file = match captions {
            Some(track) => {
                let path = workspace.path(CAPTION_FILE_NAME);
                tokio::fs::write(&path, track).await?;
                Some(path)
            }
            None => None,
        };

        info!(
            workspace = %workspace.root().display(),
            images = image_files.len(),
            captions = caption_file.is_some(),
            "Assets materialized"
        );

        Ok(WorkspaceAssets {
            root: workspace.root().to_path_buf(),
            audio_file,
            caption_file,
            image_files,
        })
    }

    async fn materialize_image(
        &self,
        dir: &Path,
        index: usize,
        source: &MediaSource,
    ) -> ComposeResult<PathBuf> {
        let (bytes, extension) = match source {
            MediaSource::Inline(data) => (
                data.bytes().to_vec(),
                data.extension().unwrap_or(DEFAULT_IMAGE_EXTENSION),
            ),
            MediaSource::Remote(url) => {
                let fetched = self.fetch(url).await;
                metrics::record_image_fetch(fetched.is_ok());
                fetched?
            }
        };

        let path = dir.join(format!("image_{:03}.{}", index, extension));
        tokio::fs::write(&path, &bytes).await?;
        Ok(path)
    }

    async fn fetch(&self, url: &Url) -> ComposeResult<(Vec<u8>, &'static str)> {
        debug!(url = %url, "Fetching image");

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ComposeError::fetch_failed(url.as_str(), e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ComposeError::fetch_failed(
                url.as_str(),
                format!("HTTP {}", status),
            ));
        }

        let extension = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(extension_for_mime)
            .unwrap_or(DEFAULT_IMAGE_EXTENSION);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ComposeError::fetch_failed(url.as_str(), e.to_string()))?;
        if bytes.is_empty() {
            return Err(ComposeError::fetch_failed(url.as_str(), "empty response body"));
        }

        Ok((bytes.to_vec(), extension))
    }
}

async fn write_audio(workspace: &Workspace, audio: &DataUri) -> ComposeResult<PathBuf> {
    if audio.bytes().is_empty() {
        return Err(ComposeError::invalid_request("audio data URI is empty"));
    }
    let extension = audio.extension().unwrap_or(DEFAULT_AUDIO_EXTENSION);
    let path = workspace.path(&format!("narration.{}", extension));
    tokio::fs::write(&path, audio.bytes()).await?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureCategory;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SRT: &str = "1\n00:00:00,000 --> 00:00:02,500\nHello there\n";

    fn inline(mime: &str, bytes: &[u8]) -> MediaSource {
        MediaSource::Inline(DataUri::from_bytes(mime, bytes.to_vec()))
    }

    fn materializer() -> AssetMaterializer {
        AssetMaterializer::new(Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_inline_assets_in_display_order() {
        let base = TempDir::new().unwrap();
        let workspace = Workspace::create(base.path()).await.unwrap();
        let images = vec![
            ImageInput::new(2, inline("image/jpeg", b"third")),
            ImageInput::new(0, inline("image/png", b"first")),
            ImageInput::new(1, inline("image/png", b"second")),
        ];

        let assets = materializer()
            .materialize(&workspace, &inline("audio/mpeg", b"mp3"), &images, Some(SRT))
            .await
            .unwrap();

        let names: Vec<String> = assets
            .image_files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["image_000.png", "image_001.png", "image_002.jpg"]);
        assert_eq!(std::fs::read(&assets.image_files[0]).unwrap(), b"first");
        assert_eq!(std::fs::read(&assets.image_files[2]).unwrap(), b"third");
        assert_eq!(assets.audio_file, workspace.path("narration.mp3"));
        assert_eq!(
            std::fs::read_to_string(assets.caption_file.unwrap()).unwrap(),
            SRT
        );
    }

    #[tokio::test]
    async fn test_remote_images_fetched() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a.jpg"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/jpeg")
                    .set_body_bytes(b"jpeg".to_vec()),
            )
            .mount(&server)
            .await;

        let base = TempDir::new().unwrap();
        let workspace = Workspace::create(base.path()).await.unwrap();
        let url = MediaSource::parse(&format!("{}/a.jpg", server.uri())).unwrap();

        let assets = materializer()
            .materialize(
                &workspace,
                &inline("audio/wav", b"wav"),
                &[ImageInput::new(0, url)],
                None,
            )
            .await
            .unwrap();

        assert_eq!(assets.image_files, vec![workspace.path("image_000.jpg")]);
        assert_eq!(assets.audio_file, workspace.path("narration.wav"));
        assert!(assets.caption_file.is_none());
        assert!(!workspace.path(CAPTION_FILE_NAME).exists());
    }

    #[tokio::test]
    async fn test_failed_fetch_fails_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok.png"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"png".to_vec()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/missing.png"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let base = TempDir::new().unwrap();
        let workspace = Workspace::create(base.path()).await.unwrap();
        let images = vec![
            ImageInput::new(0, MediaSource::parse(&format!("{}/ok.png", server.uri())).unwrap()),
            ImageInput::new(
                1,
                MediaSource::parse(&format!("{}/missing.png", server.uri())).unwrap(),
            ),
        ];

        let err = materializer()
            .materialize(&workspace, &inline("audio/mpeg", b"mp3"), &images, None)
            .await
            .unwrap_err();

        assert!(matches!(err, ComposeError::FetchFailed { .. }));
        assert_eq!(err.category(), FailureCategory::Rendering);
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn test_empty_body_is_a_fetch_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let base = TempDir::new().unwrap();
        let workspace = Workspace::create(base.path()).await.unwrap();
        let url = MediaSource::parse(&format!("{}/empty.png", server.uri())).unwrap();

        let err = materializer()
            .materialize(
                &workspace,
                &inline("audio/mpeg", b"mp3"),
                &[ImageInput::new(0, url)],
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ComposeError::FetchFailed { .. }));
    }

    #[tokio::test]
    async fn test_remote_audio_rejected() {
        let base = TempDir::new().unwrap();
        let workspace = Workspace::create(base.path()).await.unwrap();
        let audio = MediaSource::parse("https://cdn.example.com/voice.mp3").unwrap();

        let err = materializer()
            .materialize(
                &workspace,
                &audio,
                &[ImageInput::new(0, inline("image/png", b"png"))],
                None,
            )
            .await
            .unwrap_err();
        assert_eq!(err.category(), FailureCategory::InvalidInput);
    }

    #[tokio::test]
    async fn test_malformed_captions_rejected_before_writing() {
        let base = TempDir::new().unwrap();
        let workspace = Workspace::create(base.path()).await.unwrap();

        let err = materializer()
            .materialize(
                &workspace,
                &inline("audio/mpeg", b"mp3"),
                &[ImageInput::new(0, inline("image/png", b"png"))],
                Some("not a subtitle track"),
            )
            .await
            .unwrap_err();

        assert_eq!(err.category(), FailureCategory::InvalidInput);
        assert!(!workspace.path("narration.mp3").exists());
    }
}
