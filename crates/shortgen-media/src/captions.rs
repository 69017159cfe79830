//! SubRip caption tracks and the burned-in caption style.

use std::path::Path;

use crate::error::{MediaError, MediaResult};
use crate::graph::{escape_filter_path, Filter};

/// One timed caption.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionCue {
    pub index: Option<u32>,
    pub start_seconds: f64,
    pub end_seconds: f64,
    pub text: String,
}

/// A parsed SubRip (`.srt`) track.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionTrack {
    cues: Vec<CaptionCue>,
}

impl CaptionTrack {
    /// Parse numbered cue blocks with `HH:MM:SS,mmm --> HH:MM:SS,mmm` timings.
    pub fn parse(input: &str) -> MediaResult<Self> {
        let normalized = input.trim_start_matches('\u{feff}').replace("\r\n", "\n");
        let mut cues = Vec::new();

        for block in normalized.split("\n\n") {
            let mut lines = block.lines().map(str::trim_end).filter(|l| !l.trim().is_empty());
            let Some(first) = lines.next() else {
                continue;
            };

            let (index, timing_line) = if first.contains("-->") {
                (None, first)
            } else {
                let index = first.trim().parse::<u32>().map_err(|_| {
                    MediaError::invalid_captions(format!("expected cue number, got '{}'", first))
                })?;
                let timing = lines.next().ok_or_else(|| {
                    MediaError::invalid_captions(format!("cue {} has no timing line", index))
                })?;
                (Some(index), timing)
            };

            let (start_seconds, end_seconds) = parse_timing_line(timing_line)?;
            let text = lines.collect::<Vec<_>>().join("\n");

            cues.push(CaptionCue {
                index,
                start_seconds,
                end_seconds,
                text,
            });
        }

        if cues.is_empty() {
            return Err(MediaError::invalid_captions("track contains no cues"));
        }

        Ok(Self { cues })
    }

    pub fn cues(&self) -> &[CaptionCue] {
        &self.cues
    }
}

fn parse_timing_line(line: &str) -> MediaResult<(f64, f64)> {
    let (start, end) = line
        .split_once("-->")
        .ok_or_else(|| MediaError::invalid_captions(format!("bad timing line '{}'", line)))?;

    let start = parse_timestamp(start.trim())?;
    // Position hints may follow the end timestamp
    let end = parse_timestamp(end.split_whitespace().next().unwrap_or_default())?;

    if end < start {
        return Err(MediaError::invalid_captions(format!(
            "cue ends before it starts: '{}'",
            line
        )));
    }

    Ok((start, end))
}

/// Parse `HH:MM:SS,mmm` (a `.` separator is accepted too).
fn parse_timestamp(ts: &str) -> MediaResult<f64> {
    let bad = || MediaError::invalid_captions(format!("bad timestamp '{}'", ts));

    let (clock, millis) = ts.split_once([',', '.']).ok_or_else(bad)?;
    let mut parts = clock.split(':');
    let (Some(h), Some(m), Some(s), None) = (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(bad());
    };

    let h: u64 = h.parse().map_err(|_| bad())?;
    let m: u64 = m.parse().map_err(|_| bad())?;
    let s: u64 = s.parse().map_err(|_| bad())?;
    if m >= 60 || s >= 60 || millis.is_empty() || millis.len() > 3 {
        return Err(bad());
    }
    let ms: u64 = millis.parse().map_err(|_| bad())?;
    let ms = ms * 10u64.pow(3 - millis.len() as u32);

    Ok((h * 3600 + m * 60 + s) as f64 + ms as f64 / 1000.0)
}

/// Fixed burned-in caption look.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionStyle {
    pub font_name: &'static str,
    pub font_size: u32,
    /// ASS colours are `&HAABBGGRR`
    pub primary_colour: &'static str,
    pub outline_colour: &'static str,
    pub back_colour: &'static str,
    /// 3 = opaque box behind the text
    pub border_style: u32,
    pub outline: u32,
    pub shadow: u32,
    /// 2 = bottom centre
    pub alignment: u32,
    pub margin_v: u32,
    pub margin_l: u32,
    pub margin_r: u32,
}

impl Default for CaptionStyle {
    fn default() -> Self {
        Self {
            font_name: "Arial",
            font_size: 18,
            primary_colour: "&H00FFFFFF",
            outline_colour: "&H00000000",
            back_colour: "&H80000000",
            border_style: 3,
            outline: 1,
            shadow: 0,
            alignment: 2,
            margin_v: 60,
            margin_l: 40,
            margin_r: 40,
        }
    }
}

impl CaptionStyle {
    /// Value for the subtitles filter's `force_style` option.
    pub fn force_style(&self) -> String {
        format!(
            "FontName={},FontSize={},PrimaryColour={},OutlineColour={},BackColour={},\
             BorderStyle={},Outline={},Shadow={},Alignment={},MarginV={},MarginL={},MarginR={}",
            self.font_name,
            self.font_size,
            self.primary_colour,
            self.outline_colour,
            self.back_colour,
            self.border_style,
            self.outline,
            self.shadow,
            self.alignment,
            self.margin_v,
            self.margin_l,
            self.margin_r,
        )
    }

    /// `subtitles` filter burning `caption_file` into the video.
    pub fn subtitles_filter(&self, caption_file: &Path) -> Filter {
        Filter::new("subtitles")
            .escaped_arg("filename", escape_filter_path(&caption_file.to_string_lossy()))
            .quoted_arg("force_style", self.force_style())
    }
}
