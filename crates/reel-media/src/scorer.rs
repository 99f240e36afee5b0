//! Motion-energy segment scoring.
//!
//! FFmpeg's `signalstats` filter reports `YDIF`, the mean absolute luma
//! difference between consecutive frames. Sampled at a low frame rate it is
//! a cheap proxy for "how much is happening". Windows of the requested
//! length are ranked by their mean `YDIF` and picked greedily without
//! overlap.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use reel_models::Segment;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::{content_hash, write_json_atomic};

/// Default sampling rate for the motion signal.
pub const DEFAULT_SCORER_FPS: u32 = 10;

/// Scoring options.
#[derive(Debug, Clone)]
pub struct ScorerOptions {
    /// Frames per second sampled from the source
    pub fps: u32,
    /// Where computed motion signals are cached, if anywhere
    pub cache_dir: Option<PathBuf>,
}

impl Default for ScorerOptions {
    fn default() -> Self {
        Self {
            fps: DEFAULT_SCORER_FPS,
            cache_dir: None,
        }
    }
}

/// A selected window in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredWindow {
    pub start: f64,
    pub end: f64,
    pub score: f64,
}

impl ScoredWindow {
    fn overlaps(&self, other: &ScoredWindow) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Score `path` and return up to `count` non-overlapping windows of
/// `segment_sec`, best first.
///
/// Any failure yields an empty list; callers fall back to a default window.
pub async fn score_motion_segments(
    runner: &FfmpegRunner,
    path: &Path,
    segment_sec: f64,
    count: usize,
    options: &ScorerOptions,
) -> Vec<Segment> {
    if count == 0 || !(segment_sec > 0.0) {
        return Vec::new();
    }

    let fps = options.fps.max(1);
    let signal = match cached_motion_signal(runner, path, fps, options.cache_dir.as_deref()).await {
        Ok(signal) => signal,
        Err(e) => {
            warn!(path = %path.display(), "Motion scoring failed: {}", e);
            return Vec::new();
        }
    };

    let windows = select_windows(&signal, fps, segment_sec, count);
    debug!(
        path = %path.display(),
        frames = signal.len(),
        selected = windows.len(),
        "Scored motion windows"
    );

    windows
        .into_iter()
        .map(|w| Segment::new(path, w.start, w.end, w.score))
        .collect()
}

async fn cached_motion_signal(
    runner: &FfmpegRunner,
    path: &Path,
    fps: u32,
    cache_dir: Option<&Path>,
) -> MediaResult<Vec<f64>> {
    let cache_file = match cache_dir {
        Some(dir) => Some(dir.join(format!("{}_{}.json", content_hash(path).await, fps))),
        None => None,
    };

    if let Some(file) = &cache_file {
        if let Ok(bytes) = tokio::fs::read(file).await {
            if let Ok(signal) = serde_json::from_slice::<Vec<f64>>(&bytes) {
                debug!(cache = %file.display(), "Motion signal cache hit");
                return Ok(signal);
            }
        }
    }

    let signal = motion_signal(runner, path, fps).await?;

    if let Some(file) = &cache_file {
        if let Err(e) = write_json_atomic(file, &signal).await {
            warn!(cache = %file.display(), "Failed to cache motion signal: {}", e);
        }
    }
    Ok(signal)
}

/// Analysis chain that prints only the `YDIF` key per frame.
fn motion_filter(fps: u32) -> String {
    format!(
        "fps={},format=gray,signalstats,metadata=print:key=lavfi.signalstats.YDIF",
        fps
    )
}

/// Per-frame `YDIF` values of the first video stream sampled at `fps`.
pub async fn motion_signal(runner: &FfmpegRunner, path: &Path, fps: u32) -> MediaResult<Vec<f64>> {
    let cmd = FfmpegCommand::new(path, "-")
        .video_filter(motion_filter(fps))
        .output_arg("-an")
        .format("null")
        .log_level("info");

    let output = runner.run(&cmd).await?;
    let signal = parse_motion_signal(&output.stderr);
    if signal.is_empty() {
        return Err(MediaError::InvalidVideo(format!(
            "no motion samples in {}",
            path.display()
        )));
    }
    Ok(signal)
}

/// Extract `YDIF` samples (`YDIF=1.5` or `YDIF:1.5`) from FFmpeg log output.
pub fn parse_motion_signal(stderr: &str) -> Vec<f64> {
    stderr
        .lines()
        .filter_map(|line| {
            let idx = line.find("YDIF")?;
            let rest = line[idx + 4..].strip_prefix(['=', ':'])?.trim_start();
            let end = rest
                .find(|c: char| !(c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E')))
                .unwrap_or(rest.len());
            rest[..end].parse::<f64>().ok()
        })
        .filter(|v| v.is_finite())
        .collect()
}

/// Pick up to `count` non-overlapping windows of `segment_sec` from a motion
/// signal sampled at `fps`.
///
/// Windows hop one frame; each is scored by its mean. Candidates are stably
/// sorted by score, so equal scores keep the earlier window first. A signal
/// shorter than one window yields a single window at the start.
pub fn select_windows(
    signal: &[f64],
    fps: u32,
    segment_sec: f64,
    count: usize,
) -> Vec<ScoredWindow> {
    if signal.is_empty() || count == 0 || !(segment_sec > 0.0) || fps == 0 {
        return Vec::new();
    }

    let fps_f = fps as f64;
    let win = ((segment_sec * fps_f).round() as usize).max(1);

    if signal.len() < win {
        let mean = signal.iter().sum::<f64>() / signal.len() as f64;
        return vec![ScoredWindow {
            start: 0.0,
            end: segment_sec,
            score: mean,
        }];
    }

    let mut prefix = Vec::with_capacity(signal.len() + 1);
    prefix.push(0.0);
    for v in signal {
        prefix.push(prefix[prefix.len() - 1] + v);
    }

    let mut candidates: Vec<ScoredWindow> = (0..=signal.len() - win)
        .map(|i| {
            let start = i as f64 / fps_f;
            ScoredWindow {
                start,
                end: start + segment_sec,
                score: (prefix[i + win] - prefix[i]) / win as f64,
            }
        })
        .collect();

    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

    let mut selected: Vec<ScoredWindow> = Vec::with_capacity(count);
    for candidate in candidates {
        if selected.len() >= count {
            break;
        }
        if selected.iter().all(|s| !s.overlaps(&candidate)) {
            selected.push(candidate);
        }
    }
    selected
}
