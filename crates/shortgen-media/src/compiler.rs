//! Single-pass render compiler for image slideshows.
//!
//! Builds one filter graph covering every stage:
//!
//! ```text
//! [i:v] scale(4x canvas) -> pad -> zoompan(-> 1080x1920 @ 30fps) -> setsar -> format  [v{i}]
//! [v0][v1] xfade [x1]; [x1][v2] xfade [x2]; ...
//! [xN-1] subtitles [vout]          (only with a caption file)
//! ```
//!
//! Inputs are the images in display order followed by the narration audio.
//! Pan/zoom runs on a canvas four times the output size and zoompan
//! resamples down to the output frame, which keeps the per-frame crop
//! offsets from snapping to whole output pixels (visible jitter).

use std::path::{Path, PathBuf};

use shortgen_models::encoding::{OUTPUT_HEIGHT, OUTPUT_WIDTH, ZOOM_CANVAS_FACTOR};
use shortgen_models::EncodingConfig;

use crate::captions::CaptionStyle;
use crate::command::FfmpegCommand;
use crate::error::{MediaError, MediaResult};
use crate::graph::{Filter, FilterChain, FilterGraph, StreamLabel};
use crate::motion::{clip_label, MotionPlan, TransitionChain};
use crate::timing::TimingPlan;

/// Materialized files a render reads and writes.
#[derive(Debug, Clone)]
pub struct RenderAssets {
    /// Images in display order
    pub image_files: Vec<PathBuf>,
    pub audio_file: PathBuf,
    pub caption_file: Option<PathBuf>,
    pub output_path: PathBuf,
}

/// Everything needed for one FFmpeg invocation.
#[derive(Debug, Clone)]
pub struct CompiledRender {
    pub graph: FilterGraph,
    pub image_inputs: Vec<PathBuf>,
    pub audio_input: PathBuf,
    /// Final video pad
    pub video_output: StreamLabel,
    /// Narration stream, mapped unchanged
    pub audio_output: StreamLabel,
    pub duration_cap_seconds: f64,
    pub output_path: PathBuf,
}

impl CompiledRender {
    /// Whether captions are burned in.
    pub fn has_caption_stage(&self) -> bool {
        self.graph.contains_filter("subtitles")
    }

    /// Build the FFmpeg command.
    pub fn to_command(&self, encoding: &EncodingConfig) -> FfmpegCommand {
        let cmd = self
            .image_inputs
            .iter()
            .fold(FfmpegCommand::new(&self.output_path), |cmd, image| {
                cmd.input(image)
            });

        cmd.input(&self.audio_input)
            .filter_complex(self.graph.to_filter_string())
            .map(self.video_output.map_spec())
            .map(self.audio_output.map_spec())
            .encoding(encoding)
            .duration_limit(self.duration_cap_seconds)
    }
}

/// Compile the render for fully materialized assets.
pub fn compile_render(
    assets: &RenderAssets,
    timing: &TimingPlan,
    motions: &[MotionPlan],
    transitions: &TransitionChain,
) -> MediaResult<CompiledRender> {
    let image_count = assets.image_files.len();

    if image_count == 0 {
        return Err(MediaError::invalid_input("no images to compile"));
    }
    if timing.image_count != image_count || motions.len() != image_count {
        return Err(MediaError::invalid_input(format!(
            "plan mismatch: {} images, timing for {}, {} motion plans",
            image_count,
            timing.image_count,
            motions.len()
        )));
    }
    if transitions.len() != timing.transition_count() {
        return Err(MediaError::invalid_input(format!(
            "expected {} transitions, got {}",
            timing.transition_count(),
            transitions.len()
        )));
    }
    if !timing.clips_outlast_transitions() {
        return Err(MediaError::invalid_input(format!(
            "{:.3}s of audio is too short for {} images with {:.1}s cross-fades",
            timing.audio_duration_seconds, image_count, timing.transition_overlap_seconds
        )));
    }

    ensure_exists(&assets.audio_file)?;
    for image in &assets.image_files {
        ensure_exists(image)?;
    }
    if let Some(captions) = &assets.caption_file {
        ensure_exists(captions)?;
    }

    let mut graph = FilterGraph::new();

    for (index, motion) in motions.iter().enumerate() {
        graph.push(image_chain(index, motion, timing.fps));
    }

    for link in &transitions.links {
        graph.push(
            FilterChain::new()
                .input(link.left.clone())
                .input(link.right.clone())
                .filter(
                    Filter::new("xfade")
                        .arg("transition", "fade")
                        .arg("duration", format!("{:.3}", link.duration_seconds))
                        .arg("offset", format!("{:.6}", link.offset_seconds)),
                )
                .output(link.output.clone()),
        );
    }

    let video_output = match &assets.caption_file {
        Some(caption_file) => {
            let out = StreamLabel::named("vout");
            graph.push(
                FilterChain::new()
                    .input(transitions.final_output.clone())
                    .filter(CaptionStyle::default().subtitles_filter(caption_file))
                    .output(out.clone()),
            );
            out
        }
        None => transitions.final_output.clone(),
    };

    Ok(CompiledRender {
        graph,
        image_inputs: assets.image_files.clone(),
        audio_input: assets.audio_file.clone(),
        video_output,
        audio_output: StreamLabel::InputAudio(image_count),
        duration_cap_seconds: timing.duration_cap_seconds(),
        output_path: assets.output_path.clone(),
    })
}

/// Per-image stage: upscale canvas, pan/zoom, downscale, normalize.
fn image_chain(index: usize, motion: &MotionPlan, fps: u32) -> FilterChain {
    let canvas_w = OUTPUT_WIDTH * ZOOM_CANVAS_FACTOR;
    let canvas_h = OUTPUT_HEIGHT * ZOOM_CANVAS_FACTOR;

    FilterChain::new()
        .input(StreamLabel::InputVideo(index))
        .filter(
            Filter::new("scale")
                .arg("w", canvas_w)
                .arg("h", canvas_h)
                .arg("force_original_aspect_ratio", "decrease"),
        )
        .filter(
            Filter::new("pad")
                .arg("w", canvas_w)
                .arg("h", canvas_h)
                .arg("x", "(ow-iw)/2")
                .arg("y", "(oh-ih)/2")
                .arg("color", "black"),
        )
        .filter(
            Filter::new("zoompan")
                .arg("z", motion.zoom_expr())
                .arg("x", motion.direction.x_expr())
                .arg("y", motion.direction.y_expr())
                .arg("d", motion.frame_count)
                .arg("s", format!("{}x{}", OUTPUT_WIDTH, OUTPUT_HEIGHT))
                .arg("fps", fps),
        )
        .filter(Filter::new("setsar").positional(1))
        .filter(Filter::new("format").positional("yuv420p"))
        .output(clip_label(index))
}

fn ensure_exists(path: &Path) -> MediaResult<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(MediaError::FileNotFound(path.to_path_buf()))
    }
}
