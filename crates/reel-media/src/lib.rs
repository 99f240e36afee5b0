//! FFmpeg CLI wrapper for reel processing.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building and a runner capturing process output
//! - Source acquisition (local copy, HTTP download) and ffprobe metadata
//! - Motion-energy segment scoring
//! - Filter graph construction (rotation, aspect fit, crossfades, music ducking)
//! - Single-clip and montage reel rendering with cover extraction

pub mod acquire;
pub mod audio;
pub mod command;
pub mod cover;
pub mod error;
pub mod filters;
pub mod fs_utils;
pub mod montage;
pub mod probe;
pub mod render;
pub mod scorer;

pub use acquire::{list_directory_videos, MediaFetcher};
pub use audio::{mix_music, MusicSpec};
pub use command::{FfmpegCommand, FfmpegInput, FfmpegRunner, ProcessOutput, Toolchain};
pub use cover::extract_cover;
pub use error::{MediaError, MediaResult};
pub use montage::{MontageClip, MontageSpec};
pub use probe::{probe_media, probe_or_default, MediaInfo};
pub use render::{RenderGeometry, RenderOutput, RenderSpec, Renderer};
pub use scorer::{score_motion_segments, select_windows, ScoredWindow, ScorerOptions};
