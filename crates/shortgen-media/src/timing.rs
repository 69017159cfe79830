//! Per-image timing for a cross-faded slideshow.
//!
//! Every adjacent pair of clips overlaps by a fixed transition, so the
//! merged timeline is shorter than the sum of the clips. Durations are
//! solved so that
//!
//! ```text
//! N * per_image - (N - 1) * overlap == audio_duration
//! ```
//!
//! All images get the same duration.

use serde::{Deserialize, Serialize};
use shortgen_models::encoding::{DURATION_PAD_SECONDS, OUTPUT_FPS, TRANSITION_OVERLAP_SECONDS};

use crate::error::{MediaError, MediaResult};

/// Numeric schedule shared by all images.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimingPlan {
    pub image_count: usize,
    pub audio_duration_seconds: f64,
    pub per_image_duration_seconds: f64,
    pub per_image_frame_count: u32,
    pub transition_overlap_seconds: f64,
    pub fps: u32,
}

impl TimingPlan {
    /// Plan with the fixed overlap and frame rate.
    pub fn plan(image_count: usize, audio_duration_seconds: f64) -> MediaResult<Self> {
        Self::with_params(
            image_count,
            audio_duration_seconds,
            TRANSITION_OVERLAP_SECONDS,
            OUTPUT_FPS,
        )
    }

    /// Plan with explicit overlap and frame rate.
    pub fn with_params(
        image_count: usize,
        audio_duration_seconds: f64,
        transition_overlap_seconds: f64,
        fps: u32,
    ) -> MediaResult<Self> {
        if image_count == 0 {
            return Err(MediaError::invalid_input(
                "image composition requires at least one image",
            ));
        }
        if !audio_duration_seconds.is_finite() || audio_duration_seconds <= 0.0 {
            return Err(MediaError::invalid_input(format!(
                "audio duration must be positive, got {}",
                audio_duration_seconds
            )));
        }
        if !transition_overlap_seconds.is_finite() || transition_overlap_seconds < 0.0 {
            return Err(MediaError::invalid_input(format!(
                "transition overlap must be non-negative, got {}",
                transition_overlap_seconds
            )));
        }
        if fps == 0 {
            return Err(MediaError::invalid_input("fps must be positive"));
        }

        let per_image_duration_seconds = if image_count == 1 {
            audio_duration_seconds
        } else {
            let n = image_count as f64;
            (audio_duration_seconds + (n - 1.0) * transition_overlap_seconds) / n
        };

        let per_image_frame_count = (per_image_duration_seconds * fps as f64).ceil() as u32;

        Ok(Self {
            image_count,
            audio_duration_seconds,
            per_image_duration_seconds,
            per_image_frame_count,
            transition_overlap_seconds,
            fps,
        })
    }

    /// Number of cross-fades (`N - 1`).
    pub fn transition_count(&self) -> usize {
        self.image_count.saturating_sub(1)
    }

    /// Offset of the `link`-th cross-fade (1-indexed) on the merged timeline.
    ///
    /// Each earlier link already removed one overlap from the merged stream,
    /// so the offset is `D * i - T * i`, not `D * i - T`.
    pub fn transition_offset(&self, link: usize) -> f64 {
        let i = link as f64;
        self.per_image_duration_seconds * i - self.transition_overlap_seconds * i
    }

    /// Length of the merged, cross-faded sequence.
    pub fn merged_duration_seconds(&self) -> f64 {
        let n = self.image_count as f64;
        n * self.per_image_duration_seconds
            - self.transition_count() as f64 * self.transition_overlap_seconds
    }

    /// Hard `-t` cap for the output container.
    pub fn duration_cap_seconds(&self) -> f64 {
        self.audio_duration_seconds + DURATION_PAD_SECONDS
    }

    /// Whether every clip outlasts the cross-fade that overlaps it.
    pub fn clips_outlast_transitions(&self) -> bool {
        self.image_count == 1 || self.per_image_duration_seconds > self.transition_overlap_seconds
    }
}
