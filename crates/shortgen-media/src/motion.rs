//! Ken-Burns motion and cross-fade planning.
//!
//! Each image zooms from [`ZOOM_START`] to [`ZOOM_END`] while the viewport
//! stays pinned to one corner of the canvas, which reads as a slow pan
//! toward the opposite corner. The corner is drawn independently per image
//! through a [`DirectionPicker`], so tests can pin directions while
//! production gets variety.

use std::sync::atomic::{AtomicUsize, Ordering};

use rand::Rng;
use serde::{Deserialize, Serialize};
use shortgen_models::encoding::{ZOOM_END, ZOOM_START};

use crate::graph::StreamLabel;
use crate::timing::TimingPlan;

/// Corner the zoomed viewport is pinned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PanDirection {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl PanDirection {
    pub const ALL: [PanDirection; 4] = [
        PanDirection::TopLeft,
        PanDirection::TopRight,
        PanDirection::BottomLeft,
        PanDirection::BottomRight,
    ];

    /// zoompan `x` expression in terms of `iw` and `zoom`.
    pub fn x_expr(&self) -> &'static str {
        match self {
            PanDirection::TopLeft | PanDirection::BottomLeft => "0",
            PanDirection::TopRight | PanDirection::BottomRight => "iw-iw/zoom",
        }
    }

    /// zoompan `y` expression in terms of `ih` and `zoom`.
    pub fn y_expr(&self) -> &'static str {
        match self {
            PanDirection::TopLeft | PanDirection::TopRight => "0",
            PanDirection::BottomLeft | PanDirection::BottomRight => "ih-ih/zoom",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PanDirection::TopLeft => "top_left",
            PanDirection::TopRight => "top_right",
            PanDirection::BottomLeft => "bottom_left",
            PanDirection::BottomRight => "bottom_right",
        }
    }
}

/// Source of per-image pan directions.
pub trait DirectionPicker: Send + Sync {
    fn pick(&self) -> PanDirection;
}

/// Uniformly random directions (production).
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomDirections;

impl DirectionPicker for RandomDirections {
    fn pick(&self) -> PanDirection {
        PanDirection::ALL[rand::rng().random_range(0..PanDirection::ALL.len())]
    }
}

/// Cycles through a fixed list of directions.
#[derive(Debug)]
pub struct FixedDirections {
    directions: Vec<PanDirection>,
    next: AtomicUsize,
}

impl FixedDirections {
    /// Falls back to `TopLeft` when `directions` is empty.
    pub fn new(directions: Vec<PanDirection>) -> Self {
        let directions = if directions.is_empty() {
            vec![PanDirection::TopLeft]
        } else {
            directions
        };
        Self {
            directions,
            next: AtomicUsize::new(0),
        }
    }
}

impl DirectionPicker for FixedDirections {
    fn pick(&self) -> PanDirection {
        let i = self.next.fetch_add(1, Ordering::Relaxed);
        self.directions[i % self.directions.len()]
    }
}

/// Zoom/pan trajectory of one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionPlan {
    pub direction: PanDirection,
    pub zoom_start: f64,
    pub zoom_end: f64,
    pub frame_count: u32,
}

impl MotionPlan {
    pub fn new(direction: PanDirection, frame_count: u32) -> Self {
        Self {
            direction,
            zoom_start: ZOOM_START,
            zoom_end: ZOOM_END,
            frame_count,
        }
    }

    pub fn zoom_increment_per_frame(&self) -> f64 {
        if self.frame_count == 0 {
            return 0.0;
        }
        (self.zoom_end - self.zoom_start) / self.frame_count as f64
    }

    /// zoompan `z` expression: grow by the increment each frame, clamped.
    pub fn zoom_expr(&self) -> String {
        format!(
            "min(zoom+{:.8},{:.4})",
            self.zoom_increment_per_frame(),
            self.zoom_end
        )
    }
}

/// Draw one direction per image.
pub fn plan_motion(timing: &TimingPlan, picker: &dyn DirectionPicker) -> Vec<MotionPlan> {
    (0..timing.image_count)
        .map(|_| MotionPlan::new(picker.pick(), timing.per_image_frame_count))
        .collect()
}

/// Label of the `index`-th per-image clip.
pub fn clip_label(index: usize) -> StreamLabel {
    StreamLabel::named(format!("v{}", index))
}

/// One cross-fade between the merged stream so far and the next clip.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionLink {
    pub left: StreamLabel,
    pub right: StreamLabel,
    pub output: StreamLabel,
    /// Start of the fade on the merged timeline
    pub offset_seconds: f64,
    pub duration_seconds: f64,
}

/// Ordered cross-fades; `final_output` carries the full sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionChain {
    pub links: Vec<TransitionLink>,
    pub final_output: StreamLabel,
}

impl TransitionChain {
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }
}

/// Link clips `v0..vN-1` in order. A single clip is its own final stream.
pub fn plan_transitions(timing: &TimingPlan) -> TransitionChain {
    let mut links = Vec::with_capacity(timing.transition_count());
    let mut merged = clip_label(0);

    for i in 1..timing.image_count {
        let output = StreamLabel::named(format!("x{}", i));
        links.push(TransitionLink {
            left: merged,
            right: clip_label(i),
            output: output.clone(),
            offset_seconds: timing.transition_offset(i),
            duration_seconds: timing.transition_overlap_seconds,
        });
        merged = output;
    }

    TransitionChain {
        links,
        final_output: merged,
    }
}
