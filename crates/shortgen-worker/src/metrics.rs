//! Composition metrics.
//!
//! Recorded through the `metrics` facade; installing an exporter is left to
//! the embedding process.

use metrics::{counter, histogram};

use crate::error::ComposeError;

/// Metric names as constants for consistency.
pub mod names {
    pub const COMPOSITIONS_TOTAL: &str = "shortgen_compositions_total";
    pub const RENDER_SECONDS: &str = "shortgen_render_seconds";
    pub const IMAGE_FETCH_TOTAL: &str = "shortgen_image_fetch_total";
    pub const DISPATCH_TOTAL: &str = "shortgen_dispatch_total";
}

/// Outcome label: `success` or the failure category.
pub fn outcome_label<T>(result: &Result<T, ComposeError>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(e) => e.category().as_str(),
    }
}

pub fn record_composition(mode: &str, outcome: &'static str) {
    let labels = [("mode", mode.to_string()), ("outcome", outcome.to_string())];
    counter!(names::COMPOSITIONS_TOTAL, &labels).increment(1);
}

pub fn record_render(duration_secs: f64) {
    histogram!(names::RENDER_SECONDS).record(duration_secs);
}

pub fn record_image_fetch(success: bool) {
    let labels = [("outcome", if success { "ok" } else { "error" }.to_string())];
    counter!(names::IMAGE_FETCH_TOTAL, &labels).increment(1);
}

pub fn record_dispatch(success: bool) {
    let labels = [("outcome", if success { "ok" } else { "error" }.to_string())];
    counter!(names::DISPATCH_TOTAL, &labels).increment(1);
}
