//! Composition request definitions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::MediaSource;

/// One still image of the slideshow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ImageInput {
    /// Display sequence key
    pub order: i64,
    /// Inline bytes or fetchable URL
    pub source: MediaSource,
}

impl ImageInput {
    pub fn new(order: i64, source: MediaSource) -> Self {
        Self { order, source }
    }

    /// Images sorted by `order`. Ties keep their input order.
    pub fn in_display_order(images: &[ImageInput]) -> Vec<&ImageInput> {
        let mut sorted: Vec<&ImageInput> = images.iter().collect();
        sorted.sort_by_key(|image| image.order);
        sorted
    }
}

/// Visual material of a request. Exactly one mode is active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CompositionMedia {
    /// N still images with pan/zoom and cross-fades
    Images { images: Vec<ImageInput> },
    /// Single background video, rendered by the external worker
    #[serde(rename_all = "camelCase")]
    BackgroundVideo { background_video: MediaSource },
}

impl CompositionMedia {
    pub fn mode_name(&self) -> &'static str {
        match self {
            CompositionMedia::Images { .. } => "images",
            CompositionMedia::BackgroundVideo { .. } => "background_video",
        }
    }
}

/// Input to the composition pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompositionRequest {
    /// Narration audio
    pub audio: MediaSource,

    /// Authoritative narration length; the output matches it
    pub audio_duration_seconds: f64,

    /// SubRip caption track
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption_track: Option<String>,

    #[serde(flatten)]
    pub media: CompositionMedia,
}

impl CompositionRequest {
    /// Check request-level invariants.
    pub fn validate(&self) -> ModelResult<()> {
        if !self.audio_duration_seconds.is_finite() || self.audio_duration_seconds <= 0.0 {
            return Err(ModelError::validation(format!(
                "audioDurationSeconds must be positive, got {}",
                self.audio_duration_seconds
            )));
        }

        match &self.media {
            CompositionMedia::Images { images } => {
                if images.is_empty() {
                    return Err(ModelError::validation(
                        "image mode requires at least one image",
                    ));
                }
                if !self.audio.is_inline() {
                    return Err(ModelError::validation(
                        "image mode requires inline (data URI) audio",
                    ));
                }
            }
            CompositionMedia::BackgroundVideo { background_video } => {
                if self.audio.as_remote().is_none() {
                    return Err(ModelError::validation(
                        "background video mode requires a remote audio URL",
                    ));
                }
                if background_video.as_remote().is_none() {
                    return Err(ModelError::validation(
                        "background video mode requires a remote background video URL",
                    ));
                }
            }
        }

        Ok(())
    }

    /// Caption track if it carries any text.
    pub fn captions(&self) -> Option<&str> {
        self.caption_track
            .as_deref()
            .filter(|track| !track.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AUDIO: &str = "data:audio/mpeg;base64,SGVsbG8=";

    fn image(order: i64, url: &str) -> ImageInput {
        ImageInput::new(order, MediaSource::parse(url).unwrap())
    }

    #[test]
    fn test_deserialize_image_mode() {
        let json = format!(
            r#"{{
                "audio": "{}",
                "audioDurationSeconds": 10.0,
                "captionTrack": "1\n00:00:00,000 --> 00:00:01,000\nHi\n",
                "mode": "images",
                "images": [
                    {{ "order": 2, "source": "https://example.com/b.png" }},
                    {{ "order": 1, "source": "https://example.com/a.png" }}
                ]
            }}"#,
            AUDIO
        );

        let request: CompositionRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(request.audio_duration_seconds, 10.0);
        assert!(request.captions().is_some());
        match &request.media {
            CompositionMedia::Images { images } => assert_eq!(images.len(), 2),
            other => panic!("unexpected mode: {:?}", other),
        }
        request.validate().unwrap();
    }

    #[test]
    fn test_deserialize_background_mode() {
        let json = r#"{
            "audio": "https://example.com/narration.mp3",
            "audioDurationSeconds": 42.5,
            "mode": "background_video",
            "backgroundVideo": "https://example.com/minecraft.mp4"
        }"#;

        let request: CompositionRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.media.mode_name(), "background_video");
        request.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_duration() {
        for duration in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let request = CompositionRequest {
                audio: MediaSource::parse(AUDIO).unwrap(),
                audio_duration_seconds: duration,
                caption_track: None,
                media: CompositionMedia::Images {
                    images: vec![image(0, "https://example.com/a.png")],
                },
            };
            assert!(request.validate().is_err(), "duration {} accepted", duration);
        }
    }

    #[test]
    fn test_validate_rejects_empty_images() {
        let request = CompositionRequest {
            audio: MediaSource::parse(AUDIO).unwrap(),
            audio_duration_seconds: 5.0,
            caption_track: None,
            media: CompositionMedia::Images { images: vec![] },
        };
        assert!(matches!(request.validate(), Err(ModelError::Validation(_))));
    }

    #[test]
    fn test_validate_rejects_remote_audio_in_image_mode() {
        let request = CompositionRequest {
            audio: MediaSource::parse("https://example.com/a.mp3").unwrap(),
            audio_duration_seconds: 5.0,
            caption_track: None,
            media: CompositionMedia::Images {
                images: vec![image(0, "https://example.com/a.png")],
            },
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_display_order_is_stable() {
        let images = vec![
            image(2, "https://example.com/c.png"),
            image(1, "https://example.com/a.png"),
            image(2, "https://example.com/d.png"),
            image(1, "https://example.com/b.png"),
        ];

        let ordered: Vec<String> = ImageInput::in_display_order(&images)
            .into_iter()
            .map(|i| i.source.describe())
            .collect();

        assert_eq!(
            ordered,
            vec![
                "https://example.com/a.png",
                "https://example.com/b.png",
                "https://example.com/c.png",
                "https://example.com/d.png",
            ]
        );
    }

    #[test]
    fn test_blank_captions_are_absent() {
        let request = CompositionRequest {
            audio: MediaSource::parse(AUDIO).unwrap(),
            audio_duration_seconds: 5.0,
            caption_track: Some("  \n ".to_string()),
            media: CompositionMedia::Images {
                images: vec![image(0, "https://example.com/a.png")],
            },
        };
        assert!(request.captions().is_none());
    }
}
