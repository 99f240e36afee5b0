//! Caller-supplied reel job requests.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::AspectRatio;

/// Shortest reel the single-clip path will render, in seconds.
pub const MIN_SINGLE_DURATION_SECS: f64 = 3.0;

/// How the sources of a job are assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReelMode {
    /// One window from the first source
    #[default]
    Single,
    /// Several segments concatenated, optionally crossfaded
    Montage,
}

impl ReelMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReelMode::Single => "single",
            ReelMode::Montage => "montage",
        }
    }
}

impl fmt::Display for ReelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Post-processing options, carried but not applied yet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Postpass {
    pub nano_banana: bool,
    pub tone: Option<String>,
}

/// A reel rendering request.
///
/// Every field has a default so partial JSON bodies deserialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct JobRequest {
    /// Single source reference (local path, http(s) URL, or bucket URI)
    pub video_url: Option<String>,
    /// Ordered source references; takes precedence over `video_url`
    pub video_urls: Vec<String>,
    /// Directory to pick source videos from
    pub directory: Option<String>,
    /// Maximum number of source files considered
    pub max_files: usize,
    /// Per-segment duration in montage mode
    pub per_segment_sec: f64,
    /// Montage crossfade duration; `None` or zero concatenates
    pub crossfade_sec: Option<f64>,

    /// Background music reference
    pub music_url: Option<String>,
    /// Music gain in dB
    pub music_gain_db: f64,
    /// Duck music under program audio
    pub duck_music: bool,
    /// Replace program audio with the music track
    pub music_only: bool,
    pub end_with_low: bool,

    pub mode: ReelMode,
    pub target_duration_sec: f64,
    pub min_duration_sec: f64,
    pub max_duration_sec: f64,
    pub aspect: AspectRatio,

    pub speech_mode: bool,
    pub music_mode: bool,
    /// Number of candidate windows to score and report
    pub top_k_candidates: usize,
    pub keywords: Vec<String>,
    pub brand_faces_whitelist: Vec<String>,
    pub crop_safe_margin_pct: f64,
    pub postpass: Postpass,
    pub webhook_url: Option<String>,
}

impl Default for JobRequest {
    fn default() -> Self {
        Self {
            video_url: None,
            video_urls: Vec::new(),
            directory: None,
            max_files: 12,
            per_segment_sec: 3.0,
            crossfade_sec: None,
            music_url: None,
            music_gain_db: -8.0,
            duck_music: true,
            music_only: false,
            end_with_low: true,
            mode: ReelMode::Single,
            target_duration_sec: 15.0,
            min_duration_sec: 9.0,
            max_duration_sec: 20.0,
            aspect: AspectRatio::PORTRAIT,
            speech_mode: true,
            music_mode: false,
            top_k_candidates: 3,
            keywords: Vec::new(),
            brand_faces_whitelist: Vec::new(),
            crop_safe_margin_pct: 0.05,
            postpass: Postpass::default(),
            webhook_url: None,
        }
    }
}

impl JobRequest {
    /// Request for a single source reference.
    pub fn for_video(url: impl Into<String>) -> Self {
        Self {
            video_url: Some(url.into()),
            ..Default::default()
        }
    }

    /// Montage request over several source references.
    pub fn montage<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            video_urls: urls.into_iter().map(Into::into).collect(),
            mode: ReelMode::Montage,
            ..Default::default()
        }
    }

    /// Whether any source reference is present.
    pub fn has_source(&self) -> bool {
        non_blank(self.video_url.as_deref())
            || self.video_urls.iter().any(|u| !u.trim().is_empty())
            || non_blank(self.directory.as_deref())
    }

    /// Ordered explicit source references (`video_urls` wins over `video_url`).
    pub fn source_refs(&self) -> Vec<String> {
        let urls: Vec<String> = self
            .video_urls
            .iter()
            .map(|u| u.trim())
            .filter(|u| !u.is_empty())
            .map(str::to_string)
            .collect();
        if !urls.is_empty() {
            return urls;
        }
        self.video_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(|u| vec![u.to_string()])
            .unwrap_or_default()
    }

    /// Music reference, if any.
    pub fn music_ref(&self) -> Option<&str> {
        self.music_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
    }

    /// Crossfade duration when one should actually be applied.
    pub fn effective_crossfade(&self) -> Option<f64> {
        self.crossfade_sec.filter(|d| *d > 0.0)
    }

    /// Target duration capped by `max_duration_sec`, never below
    /// [`MIN_SINGLE_DURATION_SECS`].
    ///
    /// `min_duration_sec` is not enforced here: an explicit short target wins.
    pub fn clamped_target_duration(&self) -> f64 {
        self.target_duration_sec
            .min(self.max_duration_sec)
            .max(MIN_SINGLE_DURATION_SECS)
    }

    /// Validate the request before a job is created for it.
    pub fn validate(&self) -> Result<(), RequestError> {
        if !self.has_source() {
            return Err(RequestError::NoSource);
        }

        for (field, value) in [
            ("target_duration_sec", self.target_duration_sec),
            ("min_duration_sec", self.min_duration_sec),
            ("max_duration_sec", self.max_duration_sec),
            ("per_segment_sec", self.per_segment_sec),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(RequestError::NonPositive { field, value });
            }
        }

        if self.min_duration_sec > self.max_duration_sec {
            return Err(RequestError::InvalidBounds {
                min: self.min_duration_sec,
                max: self.max_duration_sec,
            });
        }

        if let Some(xfade) = self.crossfade_sec {
            if !xfade.is_finite() || xfade < 0.0 || xfade >= self.per_segment_sec {
                return Err(RequestError::InvalidCrossfade {
                    crossfade: xfade,
                    segment: self.per_segment_sec,
                });
            }
        }

        if !self.music_gain_db.is_finite() {
            return Err(RequestError::Invalid("music_gain_db must be finite".into()));
        }

        if self.max_files == 0 {
            return Err(RequestError::Invalid("max_files must be at least 1".into()));
        }

        if !(0.0..0.5).contains(&self.crop_safe_margin_pct) {
            return Err(RequestError::Invalid(format!(
                "crop_safe_margin_pct must be in [0, 0.5), got {}",
                self.crop_safe_margin_pct
            )));
        }

        Ok(())
    }
}

fn non_blank(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}

/// Request validation failures, reported synchronously at submission.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RequestError {
    #[error("Provide 'video_url' or 'video_urls' or 'directory'")]
    NoSource,

    #[error("{field} must be a positive number, got {value}")]
    NonPositive { field: &'static str, value: f64 },

    #[error("min_duration_sec ({min}) exceeds max_duration_sec ({max})")]
    InvalidBounds { min: f64, max: f64 },

    #[error(
        "crossfade_sec ({crossfade}) must be >= 0 and shorter than per_segment_sec ({segment})"
    )]
    InvalidCrossfade { crossfade: f64, segment: f64 },

    #[error("Invalid request: {0}")]
    Invalid(String),
}
