//! Multi-clip montage rendering.

use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::audio::{mix_music, MusicSpec};
use crate::command::{FfmpegCommand, FfmpegInput};
use crate::cover::extract_cover;
use crate::error::{MediaError, MediaResult};
use crate::filters::{
    aspect_chain, crossfade_graph, crossfade_offsets, normalize_chain, FilterChain, Pad,
};
use crate::fs_utils::{ensure_dir, move_file};
use crate::probe::MediaInfo;
use crate::render::{ClipPass, RenderGeometry, RenderOutput, Renderer, COVER_FILE};

/// Directory under the output dir holding per-segment renders.
pub const SEGMENTS_DIR: &str = "segments";

/// One source window of a montage.
#[derive(Debug, Clone)]
pub struct MontageClip {
    /// Local source file
    pub input: PathBuf,
    /// Probe result for the source (may be defaults)
    pub info: MediaInfo,
    /// Window start in seconds
    pub start: f64,
}

/// A montage render request.
#[derive(Debug, Clone)]
pub struct MontageSpec {
    /// Clips in timeline order
    pub clips: Vec<MontageClip>,
    /// Uniform duration of every segment
    pub segment_sec: f64,
    /// Crossfade between segments; `None` concatenates
    pub crossfade: Option<f64>,
    /// Directory receiving the reel, cover and segments
    pub output_dir: PathBuf,
    /// Optional music bed, applied after assembly
    pub music: Option<MusicSpec>,
}

impl MontageSpec {
    /// Crossfade actually applied: only with two or more clips.
    pub fn effective_crossfade(&self) -> Option<f64> {
        self.crossfade
            .filter(|x| *x > 0.0 && *x < self.segment_sec && self.clips.len() > 1)
    }

    /// Output duration and the start of each segment on the output timeline.
    pub fn timeline(&self) -> (f64, Vec<f64>) {
        let n = self.clips.len();
        let durations = vec![self.segment_sec; n];
        match self.effective_crossfade() {
            Some(xfade) => {
                let (offsets, total) = crossfade_offsets(&durations, xfade);
                let mut starts = Vec::with_capacity(n);
                starts.push(0.0);
                starts.extend(offsets);
                (total, starts)
            }
            None => (
                self.segment_sec * n as f64,
                (0..n).map(|i| i as f64 * self.segment_sec).collect(),
            ),
        }
    }
}

/// Concat demuxer list naming each segment relative to the list's directory.
pub fn ffconcat_list(segments: &[PathBuf]) -> String {
    let mut list = String::from("ffconcat version 1.0\n");
    for segment in segments {
        let name = segment
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| segment.to_string_lossy().to_string());
        list.push_str(&format!("file '{}'\n", name.replace('\'', "'\\''")));
    }
    list
}

/// Upright size of a clip after the normalization pass, which truncates
/// both sides to even values.
pub fn normalized_dimensions(info: &MediaInfo) -> Option<(u32, u32)> {
    info.upright_dimensions().map(|(w, h)| (w & !1, h & !1))
}

/// Chain fitting a normalized clip to the reel frame, frozen on its last
/// frame if the source runs short.
pub(crate) fn fit_chain(
    geometry: &RenderGeometry,
    info: &MediaInfo,
    segment_sec: f64,
) -> FilterChain {
    aspect_chain(
        geometry.width,
        geometry.height,
        geometry.fps,
        normalized_dimensions(info),
    )
    .filter(format!("tpad=stop_mode=clone:stop_duration={:.3}", segment_sec))
}

impl Renderer {
    /// Render a montage into `reel_<W>x<H>.mp4` plus a cover.
    pub async fn render_montage(&self, spec: &MontageSpec) -> MediaResult<RenderOutput> {
        if spec.clips.is_empty() {
            return Err(MediaError::NoSources);
        }
        if !(spec.segment_sec > 0.0) {
            return Err(MediaError::InvalidVideo(format!(
                "segment duration must be positive, got {}",
                spec.segment_sec
            )));
        }

        let segments_dir = spec.output_dir.join(SEGMENTS_DIR);
        ensure_dir(&segments_dir).await?;

        info!(
            clips = spec.clips.len(),
            segment_sec = spec.segment_sec,
            crossfade = ?spec.effective_crossfade(),
            "Rendering montage"
        );

        let mut segments = Vec::with_capacity(spec.clips.len());
        for (i, clip) in spec.clips.iter().enumerate() {
            segments.push(self.render_segment(clip, i, spec.segment_sec, &segments_dir).await?);
        }

        let (duration, timeline_offsets) = spec.timeline();
        let assembled = segments_dir.join("assembled.mp4");
        match spec.effective_crossfade() {
            Some(xfade) => {
                self.crossfade_segments(&segments, spec.segment_sec, xfade, &assembled)
                    .await?
            }
            None => {
                self.concat_segments(&segments, &segments_dir, &assembled)
                    .await?
            }
        }

        let video = spec.output_dir.join(self.geometry.reel_file_name());
        match &spec.music {
            Some(music) => {
                mix_music(&self.runner, &self.encoding, &assembled, music, duration, &video).await?;
                let _ = tokio::fs::remove_file(&assembled).await;
            }
            None => move_file(&assembled, &video).await?,
        }

        let cover = spec.output_dir.join(COVER_FILE);
        extract_cover(&self.runner, &video, &cover, duration, &self.geometry).await?;

        Ok(RenderOutput {
            video,
            cover,
            duration,
            timeline_offsets,
        })
    }

    /// Normalize one clip, then render it to the reel geometry at exactly
    /// `segment_sec`.
    async fn render_segment(
        &self,
        clip: &MontageClip,
        index: usize,
        segment_sec: f64,
        segments_dir: &Path,
    ) -> MediaResult<PathBuf> {
        let normalized = segments_dir.join(format!("norm_{:02}.mp4", index));
        let segment = segments_dir.join(format!("seg_{:02}.mp4", index));

        // Rotation, frame rate, even dimensions, stereo 48 kHz audio
        let normalize = ClipPass {
            input: &clip.input,
            info: &clip.info,
            start: clip.start,
            duration: segment_sec,
            output: &normalized,
            video_chain: normalize_chain(self.geometry.fps),
            loudness: false,
            audio_tail: FilterChain::audio(),
            music: None,
        };
        self.runner.run(&self.clip_command(&normalize)).await?;

        // The normalized file is upright, has audio, and starts at zero
        let upright = MediaInfo {
            width: None,
            height: None,
            rotation: 0,
            has_audio: true,
            ..clip.info.clone()
        };
        let fit = ClipPass {
            input: &normalized,
            info: &upright,
            start: 0.0,
            duration: segment_sec,
            output: &segment,
            video_chain: fit_chain(&self.geometry, &clip.info, segment_sec),
            loudness: true,
            audio_tail: FilterChain::audio().filter("apad"),
            music: None,
        };
        self.runner.run(&self.clip_command(&fit)).await?;

        if let Err(e) = tokio::fs::remove_file(&normalized).await {
            warn!(path = %normalized.display(), "Failed to remove normalized clip: {}", e);
        }
        Ok(segment)
    }

    async fn crossfade_segments(
        &self,
        segments: &[PathBuf],
        segment_sec: f64,
        crossfade: f64,
        output: &Path,
    ) -> MediaResult<()> {
        let durations = vec![segment_sec; segments.len()];
        let graph = crossfade_graph(&durations, crossfade);

        let mut cmd = FfmpegCommand::new(&segments[0], output);
        for segment in &segments[1..] {
            cmd = cmd.add_input(FfmpegInput::file(segment));
        }
        let cmd = cmd
            .filter_complex(graph.to_string())
            .map(Pad::label("vout").map_arg())
            .map(Pad::label("aout").map_arg())
            .output_args(self.encoding.to_ffmpeg_args())
            .faststart();

        self.runner.run(&cmd).await?;
        Ok(())
    }

    /// Stream-copy concat, re-encoding only when FFmpeg rejects the copy.
    async fn concat_segments(
        &self,
        segments: &[PathBuf],
        segments_dir: &Path,
        output: &Path,
    ) -> MediaResult<()> {
        let list = segments_dir.join("concat.ffconcat");
        tokio::fs::write(&list, ffconcat_list(segments)).await?;

        let copy = FfmpegCommand::with_input(FfmpegInput::concat_list(&list), output)
            .stream_copy()
            .faststart();

        match self.runner.run(&copy).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_ffmpeg_failure() => {
                warn!("Stream-copy concat failed, re-encoding: {}", e);
                let reencode = FfmpegCommand::with_input(FfmpegInput::concat_list(&list), output)
                    .output_args(self.encoding.to_ffmpeg_args())
                    .faststart();
                self.runner.run(&reencode).await?;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
