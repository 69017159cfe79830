//! FFmpeg command builder and runner.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::debug;

use shortgen_models::EncodingConfig;

use crate::error::{MediaError, MediaResult};
use crate::progress::{is_progress_line, parse_progress_line, FfmpegProgress};

/// Default cap on retained FFmpeg diagnostics (32 MiB).
pub const DEFAULT_MAX_DIAGNOSTIC_BYTES: usize = 32 * 1024 * 1024;

/// Consecutive stderr read errors tolerated before giving up on the pipe.
const MAX_STDERR_READ_ERRORS: u32 = 3;

/// One `-i` input and the arguments that precede it.
#[derive(Debug, Clone, PartialEq)]
pub struct FfmpegInput {
    pub path: PathBuf,
    pub args: Vec<String>,
}

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Inputs in `-i` order
    inputs: Vec<FfmpegInput>,
    /// Output file path
    output: PathBuf,
    /// Output arguments (after all inputs)
    output_args: Vec<String>,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command writing to `output`.
    pub fn new(output: impl AsRef<Path>) -> Self {
        Self {
            inputs: Vec::new(),
            output: output.as_ref().to_path_buf(),
            output_args: Vec::new(),
        }
    }

    /// Add an input file.
    pub fn input(self, path: impl AsRef<Path>) -> Self {
        self.input_with_args(path, Vec::<String>::new())
    }

    /// Add an input file with per-input arguments.
    pub fn input_with_args<I, S>(mut self, path: impl AsRef<Path>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs.push(FfmpegInput {
            path: path.as_ref().to_path_buf(),
            args: args.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Add output arguments.
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set filter complex.
    pub fn filter_complex(self, filter: impl Into<String>) -> Self {
        self.output_arg("-filter_complex").output_arg(filter)
    }

    /// Map a stream into the output.
    pub fn map(self, spec: impl Into<String>) -> Self {
        self.output_arg("-map").output_arg(spec)
    }

    /// Cap the output duration.
    pub fn duration_limit(self, seconds: f64) -> Self {
        self.output_arg("-t").output_arg(format!("{:.3}", seconds))
    }

    /// Apply codec, quality and container flags.
    pub fn encoding(self, config: &EncodingConfig) -> Self {
        self.output_args(config.to_ffmpeg_args())
    }

    pub fn inputs(&self) -> &[FfmpegInput] {
        &self.inputs
    }

    pub fn output_path(&self) -> &Path {
        &self.output
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = vec!["-y".to_string(), "-v".to_string(), "error".to_string()];

        // Progress output to stderr
        args.push("-progress".to_string());
        args.push("pipe:2".to_string());
        args.push("-nostats".to_string());

        for input in &self.inputs {
            args.extend(input.args.iter().cloned());
            args.push("-i".to_string());
            args.push(input.path.to_string_lossy().to_string());
        }

        args.extend(self.output_args.iter().cloned());

        args.push(self.output.to_string_lossy().to_string());

        args
    }
}

/// Stderr lines kept for diagnostics, bounded by total size.
#[derive(Debug)]
struct DiagnosticBuffer {
    lines: VecDeque<String>,
    bytes: usize,
    max_bytes: usize,
    dropped: usize,
}

impl DiagnosticBuffer {
    fn new(max_bytes: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            bytes: 0,
            max_bytes,
            dropped: 0,
        }
    }

    /// Append a line, evicting the oldest ones past the cap.
    fn push(&mut self, line: String) {
        self.bytes += line.len() + 1;
        self.lines.push_back(line);
        while self.bytes > self.max_bytes {
            match self.lines.pop_front() {
                Some(old) => {
                    self.bytes -= old.len() + 1;
                    self.dropped += 1;
                }
                None => break,
            }
        }
    }

    fn into_text(self) -> String {
        let mut text = String::with_capacity(self.bytes + 48);
        if self.dropped > 0 {
            text.push_str(&format!("[{} earlier lines dropped]\n", self.dropped));
        }
        for line in self.lines {
            text.push_str(&line);
            text.push('\n');
        }
        text
    }
}

/// Runner for FFmpeg commands with progress parsing and bounded stderr capture.
#[derive(Debug, Clone)]
pub struct FfmpegRunner {
    /// Program name or path
    binary: String,
    /// Cap on retained diagnostic output
    max_diagnostic_bytes: usize,
}

impl Default for FfmpegRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegRunner {
    /// Create a runner for `ffmpeg` on `PATH`.
    pub fn new() -> Self {
        Self {
            binary: "ffmpeg".to_string(),
            max_diagnostic_bytes: DEFAULT_MAX_DIAGNOSTIC_BYTES,
        }
    }

    /// Use a specific FFmpeg binary.
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Set the diagnostic buffer cap.
    pub fn with_max_diagnostic_bytes(mut self, bytes: usize) -> Self {
        self.max_diagnostic_bytes = bytes.max(1);
        self
    }

    /// Run an FFmpeg command.
    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<String> {
        self.run_with_progress(cmd, |_| {}).await
    }

    /// Run an FFmpeg command with progress callback.
    ///
    /// Returns the retained diagnostic output on success. On a non-zero exit
    /// the diagnostics travel inside [`MediaError::FfmpegFailed`].
    pub async fn run_with_progress<F>(
        &self,
        cmd: &FfmpegCommand,
        progress_callback: F,
    ) -> MediaResult<String>
    where
        F: Fn(FfmpegProgress) + Send + 'static,
    {
        let program = which::which(&self.binary)
            .map_err(|e| MediaError::FfmpegNotFound(format!("{}: {}", self.binary, e)))?;

        let args = cmd.build_args();
        debug!("Running FFmpeg: {} {}", program.display(), args.join(" "));

        let mut child = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::ffmpeg_failed("stderr not captured", None, None))?;
        let mut reader = BufReader::new(stderr);
        let max_bytes = self.max_diagnostic_bytes;

        // Drain stderr concurrently so the pipe never fills up
        let reader_handle = tokio::spawn(async move {
            let mut diagnostics = DiagnosticBuffer::new(max_bytes);
            let mut current = FfmpegProgress::default();
            let mut buf = Vec::new();
            let mut read_errors = 0;

            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf).await {
                    Ok(0) => break,
                    Ok(_) => read_errors = 0,
                    Err(e) => {
                        read_errors += 1;
                        if read_errors > MAX_STDERR_READ_ERRORS {
                            diagnostics.push(format!("[stderr read failed: {}]", e));
                            break;
                        }
                        continue;
                    }
                }

                // Metadata echoed from inputs is not always UTF-8
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\n', '\r']);
                if is_progress_line(line) {
                    if let Some(snapshot) = parse_progress_line(line, &mut current) {
                        progress_callback(snapshot);
                    }
                } else {
                    diagnostics.push(line.to_string());
                }
            }

            diagnostics.into_text()
        });

        let status = child.wait().await?;
        let diagnostics = reader_handle.await.unwrap_or_default();

        if status.success() {
            Ok(diagnostics)
        } else {
            Err(MediaError::ffmpeg_failed(
                "FFmpeg exited with non-zero status",
                Some(diagnostics),
                status.code(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builder() {
        let cmd = FfmpegCommand::new("out.mp4")
            .input("a.png")
            .input("b.png")
            .input("narration.mp3")
            .filter_complex("[0:v]null[v]")
            .map("[v]")
            .map("2:a")
            .duration_limit(7.1)
            .encoding(&EncodingConfig::default());

        let args = cmd.build_args();
        assert_eq!(args[0], "-y");
        assert_eq!(args.iter().filter(|a| *a == "-i").count(), 3);

        let first = args.iter().position(|a| a == "a.png").unwrap();
        let second = args.iter().position(|a| a == "b.png").unwrap();
        let audio = args.iter().position(|a| a == "narration.mp3").unwrap();
        assert!(first < second && second < audio);

        let t = args.iter().position(|a| a == "-t").unwrap();
        assert_eq!(args[t + 1], "7.100");
        assert!(args.contains(&"libx264".to_string()));
        assert_eq!(args.last().unwrap(), "out.mp4");
    }

    #[test]
    fn test_input_args_precede_input() {
        let cmd = FfmpegCommand::new("out.mp4").input_with_args("bg.mp4", ["-stream_loop", "-1"]);
        let args = cmd.build_args();
        let loop_pos = args.iter().position(|a| a == "-stream_loop").unwrap();
        let input_pos = args.iter().position(|a| a == "bg.mp4").unwrap();
        assert!(loop_pos < input_pos);
    }

    #[test]
    fn test_diagnostic_buffer_is_bounded() {
        let mut buffer = DiagnosticBuffer::new(32);
        for i in 0..10 {
            buffer.push(format!("line number {}", i));
        }
        assert!(buffer.bytes <= 32);
        let text = buffer.into_text();
        assert!(text.contains("earlier lines dropped"));
        assert!(text.contains("line number 9"));
        assert!(!text.contains("line number 0\n"));
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let runner = FfmpegRunner::new().with_binary("/nonexistent/ffmpeg-binary");
        let cmd = FfmpegCommand::new("out.mp4").input("in.png");
        let err = runner.run(&cmd).await.unwrap_err();
        assert!(matches!(err, MediaError::FfmpegNotFound(_)));
    }
}
