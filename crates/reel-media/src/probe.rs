//! FFprobe media information.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::warn;

use crate::command::run_process;
use crate::error::{MediaError, MediaResult};

/// Media file information. Every field is optional except the
/// normalized rotation, because probing is advisory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Coded width in pixels
    pub width: Option<u32>,
    /// Coded height in pixels
    pub height: Option<u32>,
    /// Frame rate (fps)
    pub fps: Option<f64>,
    /// Clockwise rotation needed to display upright: 0, 90, 180 or 270
    pub rotation: u32,
    /// Duration in seconds
    pub duration: Option<f64>,
    /// Whether an audio stream exists
    pub has_audio: bool,
    /// Audio sample rate in Hz
    pub sample_rate: Option<u32>,
    /// Video codec
    pub codec: Option<String>,
}

impl Default for MediaInfo {
    fn default() -> Self {
        Self {
            width: None,
            height: None,
            fps: None,
            rotation: 0,
            duration: None,
            has_audio: true,
            sample_rate: None,
            codec: None,
        }
    }
}

impl MediaInfo {
    /// Dimensions as displayed, i.e. swapped for 90/270 degree rotations.
    pub fn upright_dimensions(&self) -> Option<(u32, u32)> {
        let (w, h) = (self.width?, self.height?);
        if w == 0 || h == 0 {
            return None;
        }
        if self.rotation == 90 || self.rotation == 270 {
            Some((h, w))
        } else {
            Some((w, h))
        }
    }
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    sample_rate: Option<String>,
    duration: Option<String>,
    #[serde(default)]
    tags: HashMap<String, String>,
    #[serde(default)]
    side_data_list: Vec<FfprobeSideData>,
}

#[derive(Debug, Deserialize)]
struct FfprobeSideData {
    rotation: Option<serde_json::Value>,
}

/// Probe a media file with ffprobe.
pub async fn probe_media(
    ffprobe: impl AsRef<Path>,
    path: impl AsRef<Path>,
) -> MediaResult<MediaInfo> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    let args: Vec<String> = [
        "-v",
        "error",
        "-print_format",
        "json",
        "-show_format",
        "-show_streams",
    ]
    .iter()
    .map(|s| s.to_string())
    .chain(std::iter::once(path.to_string_lossy().to_string()))
    .collect();

    let output = match run_process(ffprobe.as_ref(), &args, None).await {
        Err(MediaError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(MediaError::FfprobeNotFound(ffprobe.as_ref().display().to_string()))
        }
        other => other?,
    };

    if !output.success() {
        return Err(MediaError::ffprobe_failed(format!(
            "{}: {}",
            path.display(),
            output.stderr.trim()
        )));
    }

    parse_probe_output(&output.stdout)
}

/// Probe, or fall back to [`MediaInfo::default`] with a warning.
pub async fn probe_or_default(ffprobe: impl AsRef<Path>, path: impl AsRef<Path>) -> MediaInfo {
    let path = path.as_ref();
    match probe_media(ffprobe, path).await {
        Ok(info) => info,
        Err(e) => {
            warn!(path = %path.display(), "Probe failed, using defaults: {}", e);
            MediaInfo::default()
        }
    }
}

fn parse_probe_output(json: &str) -> MediaResult<MediaInfo> {
    let probe: FfprobeOutput = serde_json::from_str(json)?;

    let video = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| MediaError::InvalidVideo("No video stream found".to_string()))?;
    let audio = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("audio"));

    let duration = probe
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .or(video.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0);

    let fps = video
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| video.r_frame_rate.as_deref().and_then(parse_frame_rate));

    Ok(MediaInfo {
        width: video.width.filter(|w| *w > 0),
        height: video.height.filter(|h| *h > 0),
        fps,
        rotation: stream_rotation(video),
        duration,
        has_audio: audio.is_some(),
        sample_rate: audio
            .and_then(|a| a.sample_rate.as_deref())
            .and_then(|r| r.parse().ok()),
        codec: video.codec_name.clone(),
    })
}

/// Rotation from the legacy `rotate` tag, or else from display-matrix side
/// data (which is counter-clockwise, hence negated).
fn stream_rotation(stream: &FfprobeStream) -> u32 {
    if let Some(deg) = stream.tags.get("rotate").and_then(|r| r.trim().parse::<f64>().ok()) {
        return normalize_rotation(deg);
    }
    stream
        .side_data_list
        .iter()
        .filter_map(|sd| sd.rotation.as_ref())
        .filter_map(|v| match v {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
        .map(|deg| normalize_rotation(-deg))
        .next()
        .unwrap_or(0)
}

/// Snap any angle to the nearest multiple of 90 in `[0, 360)`.
pub fn normalize_rotation(degrees: f64) -> u32 {
    if !degrees.is_finite() {
        return 0;
    }
    let quarter = (degrees / 90.0).round() as i64;
    (quarter.rem_euclid(4) * 90) as u32
}

/// Parse frame rate string (e.g., "30/1" or "29.97").
fn parse_frame_rate(s: &str) -> Option<f64> {
    let fps = if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den <= 0.0 {
            return None;
        }
        num / den
    } else {
        s.parse().ok()?
    };
    (fps.is_finite() && fps > 0.0).then_some(fps)
}
