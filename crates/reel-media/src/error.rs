//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Maximum number of stderr characters kept on a failed FFmpeg run.
pub const STDERR_TAIL_CHARS: usize = 2000;

/// Errors that can occur during media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found: {0}")]
    FfmpegNotFound(String),

    #[error("FFprobe not found: {0}")]
    FfprobeNotFound(String),

    #[error("FFmpeg command failed: {message}{}", tail_suffix(.stderr_tail))]
    FfmpegFailed {
        message: String,
        stderr_tail: String,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed { message: String },

    #[error("Download failed: {message}")]
    DownloadFailed { message: String },

    #[error("Unsupported source: {0}")]
    UnsupportedSource(String),

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("No video sources resolved")]
    NoSources,

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid video file: {0}")]
    InvalidVideo(String),
}

fn tail_suffix(tail: &str) -> String {
    if tail.is_empty() {
        String::new()
    } else {
        format!(": {}", tail)
    }
}

/// Keep only the last `max_chars` characters of process output.
pub fn stderr_tail(stderr: &str, max_chars: usize) -> String {
    let trimmed = stderr.trim_end();
    let count = trimmed.chars().count();
    if count <= max_chars {
        return trimmed.to_string();
    }
    trimmed.chars().skip(count - max_chars).collect()
}

impl MediaError {
    /// Create an FFmpeg failure error, truncating stderr to its tail.
    pub fn ffmpeg_failed(message: impl Into<String>, stderr: &str, exit_code: Option<i32>) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr_tail: stderr_tail(stderr, STDERR_TAIL_CHARS),
            exit_code,
        }
    }

    /// Create an FFprobe failure error.
    pub fn ffprobe_failed(message: impl Into<String>) -> Self {
        Self::FfprobeFailed {
            message: message.into(),
        }
    }

    /// Create a download failure error.
    pub fn download_failed(message: impl Into<String>) -> Self {
        Self::DownloadFailed {
            message: message.into(),
        }
    }

    /// Whether this error came from a failed FFmpeg process (as opposed to
    /// a missing binary or an I/O problem).
    pub fn is_ffmpeg_failure(&self) -> bool {
        matches!(self, Self::FfmpegFailed { .. })
    }
}
