//! FFmpeg command builder and runner.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// One `-i` input together with the options that precede it.
#[derive(Debug, Clone, PartialEq)]
pub struct FfmpegInput {
    /// Input arguments (before -i)
    args: Vec<String>,
    /// Value passed to -i
    source: String,
}

impl FfmpegInput {
    /// A file input.
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self {
            args: Vec::new(),
            source: path.as_ref().to_string_lossy().to_string(),
        }
    }

    /// A libavfilter source such as `anullsrc=...`.
    pub fn lavfi(graph: impl Into<String>) -> Self {
        Self {
            args: vec!["-f".to_string(), "lavfi".to_string()],
            source: graph.into(),
        }
    }

    /// An ffconcat list file read by the concat demuxer.
    pub fn concat_list(path: impl AsRef<Path>) -> Self {
        Self {
            args: vec![
                "-f".to_string(),
                "concat".to_string(),
                "-safe".to_string(),
                "0".to_string(),
            ],
            source: path.as_ref().to_string_lossy().to_string(),
        }
    }

    /// Add an input argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Set seek position.
    pub fn seek(self, seconds: f64) -> Self {
        self.arg("-ss").arg(format!("{:.3}", seconds))
    }

    /// Limit how much of the input is read.
    pub fn duration(self, seconds: f64) -> Self {
        self.arg("-t").arg(format!("{:.3}", seconds))
    }

    /// Loop the input forever; pair with `duration`.
    pub fn loop_forever(self) -> Self {
        self.arg("-stream_loop").arg("-1")
    }

    /// Disable FFmpeg's own rotation handling for this input.
    pub fn no_autorotate(self) -> Self {
        self.arg("-noautorotate")
    }

    fn push_args(&self, args: &mut Vec<String>) {
        args.extend(self.args.iter().cloned());
        args.push("-i".to_string());
        args.push(self.source.clone());
    }
}

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Inputs in index order
    inputs: Vec<FfmpegInput>,
    /// Output file path
    output: PathBuf,
    /// Output arguments (after all inputs)
    output_args: Vec<String>,
    /// Whether to overwrite output
    overwrite: bool,
    /// Log level
    log_level: String,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command with a single file input.
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self::with_input(FfmpegInput::file(input), output)
    }

    /// Create a new FFmpeg command from a prepared input.
    pub fn with_input(input: FfmpegInput, output: impl AsRef<Path>) -> Self {
        Self {
            inputs: vec![input],
            output: output.as_ref().to_path_buf(),
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
        }
    }

    /// Append another input. Returns the builder; the new input's index is
    /// `input_count() - 1`.
    pub fn add_input(mut self, input: FfmpegInput) -> Self {
        self.inputs.push(input);
        self
    }

    /// Number of inputs added so far.
    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    /// Add input arguments to the first input (before its -i).
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        if let Some(first) = self.inputs.first_mut() {
            first.args.push(arg.into());
        }
        self
    }

    /// Add output arguments (after all inputs).
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

    /// Set seek position on the first input.
    pub fn seek(self, seconds: f64) -> Self {
        self.input_arg("-ss").input_arg(format!("{:.3}", seconds))
    }

    /// Limit the output duration.
    pub fn duration(self, seconds: f64) -> Self {
        self.output_arg("-t").output_arg(format!("{:.3}", seconds))
    }

    /// Set video filter.
    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    /// Set filter complex.
    pub fn filter_complex(self, filter: impl Into<String>) -> Self {
        self.output_arg("-filter_complex").output_arg(filter)
    }

    /// Map a stream specifier or a filter graph label (`[v]`) to the output.
    pub fn map(self, stream: impl Into<String>) -> Self {
        self.output_arg("-map").output_arg(stream)
    }

    /// Set video codec.
    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    /// Copy every stream without re-encoding.
    pub fn stream_copy(self) -> Self {
        self.output_arg("-c").output_arg("copy")
    }

    /// Set output container format.
    pub fn format(self, format: impl Into<String>) -> Self {
        self.output_arg("-f").output_arg(format)
    }

    /// Move the moov atom to the front for progressive playback.
    pub fn faststart(self) -> Self {
        self.output_arg("-movflags").output_arg("+faststart")
    }

    /// Extract single frame.
    pub fn single_frame(self) -> Self {
        self.output_arg("-frames:v").output_arg("1")
    }

    /// Set log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }
        args.push("-hide_banner".to_string());
        args.push("-nostdin".to_string());

        args.push("-v".to_string());
        args.push(self.log_level.clone());

        for input in &self.inputs {
            input.push_args(&mut args);
        }

        args.extend(self.output_args.clone());
        args.push(self.output.to_string_lossy().to_string());

        args
    }
}

/// Captured result of an external process.
#[derive(Debug, Clone, Default)]
pub struct ProcessOutput {
    /// Exit code, `None` when killed by a signal
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Paths of the external tools, fixed at process start.
#[derive(Debug, Clone)]
pub struct Toolchain {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

impl Toolchain {
    pub fn new(ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    /// Resolve both binaries through `PATH` (absolute paths are checked as-is).
    pub fn resolve(&self) -> MediaResult<Self> {
        let ffmpeg = which::which(&self.ffmpeg)
            .map_err(|_| MediaError::FfmpegNotFound(self.ffmpeg.display().to_string()))?;
        let ffprobe = which::which(&self.ffprobe)
            .map_err(|_| MediaError::FfprobeNotFound(self.ffprobe.display().to_string()))?;
        Ok(Self { ffmpeg, ffprobe })
    }

    /// Runner for the configured FFmpeg binary.
    pub fn runner(&self) -> FfmpegRunner {
        FfmpegRunner::new(&self.ffmpeg)
    }
}

/// Runner for FFmpeg commands with timeout support.
#[derive(Debug, Clone)]
pub struct FfmpegRunner {
    /// FFmpeg binary
    binary: PathBuf,
    /// Timeout in seconds
    timeout_secs: Option<u64>,
}

impl Default for FfmpegRunner {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl FfmpegRunner {
    /// Create a new runner for the given binary.
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            timeout_secs: None,
        }
    }

    /// Set timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn timeout_secs(&self) -> Option<u64> {
        self.timeout_secs
    }

    /// Run an FFmpeg command; non-zero exit becomes `MediaError::FfmpegFailed`.
    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<ProcessOutput> {
        let output = self.run_unchecked(cmd).await?;
        if output.success() {
            Ok(output)
        } else {
            Err(MediaError::ffmpeg_failed(
                format!(
                    "{} exited with status {}",
                    self.binary.display(),
                    output
                        .status
                        .map(|c| c.to_string())
                        .unwrap_or_else(|| "signal".to_string())
                ),
                &output.stderr,
                output.status,
            ))
        }
    }

    /// Run an FFmpeg command and return its output whatever the exit status.
    pub async fn run_unchecked(&self, cmd: &FfmpegCommand) -> MediaResult<ProcessOutput> {
        let args = cmd.build_args();
        debug!(binary = %self.binary.display(), "Running FFmpeg: {}", args.join(" "));

        let started = Instant::now();
        let result = run_process(&self.binary, &args, self.timeout_secs).await;
        record_invocation(&result, started.elapsed());

        match result {
            Err(MediaError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Err(
                MediaError::FfmpegNotFound(self.binary.display().to_string()),
            ),
            other => other,
        }
    }
}

/// Spawn a process with an argument list, capture its output, and enforce an
/// optional timeout.
pub(crate) async fn run_process(
    binary: &Path,
    args: &[String],
    timeout_secs: Option<u64>,
) -> MediaResult<ProcessOutput> {
    let child = Command::new(binary)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let output = match timeout_secs {
        Some(secs) => {
            let limit = Duration::from_secs(secs);
            match tokio::time::timeout(limit, child.wait_with_output()).await {
                Ok(result) => result?,
                Err(_) => {
                    // Dropping the future drops the child, which kills it
                    warn!("{} timed out after {} seconds, killing process", binary.display(), secs);
                    return Err(MediaError::Timeout(secs));
                }
            }
        }
        None => child.wait_with_output().await?,
    };

    Ok(ProcessOutput {
        status: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}

fn record_invocation(result: &MediaResult<ProcessOutput>, elapsed: Duration) {
    let outcome = match result {
        Ok(output) if output.success() => "success",
        Ok(_) => "failure",
        Err(MediaError::Timeout(_)) => "timeout",
        Err(_) => "spawn_error",
    };
    metrics::counter!("reel_ffmpeg_invocations_total", "outcome" => outcome).increment(1);
    metrics::histogram!("reel_ffmpeg_duration_seconds").record(elapsed.as_secs_f64());
}
