#![deny(unreachable_patterns)]
//! FFmpeg composition for vertical short videos.
//!
//! This crate provides:
//! - Timing plan for N images cross-faded over a narration track
//! - Ken-Burns pan/zoom and cross-fade planning
//! - A typed filter graph, serialized to FFmpeg syntax only at the boundary
//! - The single-pass render compiler (scale, zoompan, xfade, subtitles)
//! - Render execution with progress parsing and bounded diagnostics
//! - FFprobe output verification and cross-device file moves

pub mod captions;
pub mod command;
pub mod compiler;
pub mod error;
pub mod fs_utils;
pub mod graph;
pub mod motion;
pub mod probe;
pub mod progress;
pub mod render;
pub mod timing;

pub use captions::{CaptionCue, CaptionStyle, CaptionTrack};
pub use command::{FfmpegCommand, FfmpegRunner};
pub use compiler::{compile_render, CompiledRender, RenderAssets};
pub use error::{MediaError, MediaResult};
pub use graph::{Filter, FilterChain, FilterGraph, StreamLabel};
pub use motion::{
    plan_motion, plan_transitions, DirectionPicker, FixedDirections, MotionPlan, PanDirection,
    RandomDirections, TransitionChain, TransitionLink,
};
pub use probe::{probe_media, MediaInfo};
pub use progress::FfmpegProgress;
pub use render::{RenderArtifact, RenderExecutor, RenderSettings};
pub use timing::TimingPlan;
