//! Reel rendering.
//!
//! # Architecture
//!
//! Two entry points share one clip renderer:
//!
//! ## 1. `Renderer::render_single()`
//! One window of one source: trim, rotation correction, aspect fit,
//! loudness normalization and an optional music bed in a single pass.
//!
//! ## 2. `Renderer::render_montage()` (see `montage.rs`)
//! Several windows: a normalization pass per clip, uniform segment renders,
//! then assembly by crossfade or concat, then the music bed.
//!
//! Both finish with a cover frame from the final output.

use std::path::{Path, PathBuf};
use tracing::info;

use reel_models::{AspectRatio, EncodingConfig};

use crate::audio::{music_mix_graph, MusicSpec};
use crate::command::{FfmpegCommand, FfmpegInput, FfmpegRunner};
use crate::cover::extract_cover;
use crate::error::{MediaError, MediaResult};
use crate::filters::{
    aspect_chain, audio_format_chain, loudness_chain, rotation_chain, silent_audio_source,
    FilterChain, FilterGraph, Pad, StreamKind,
};
use crate::fs_utils::ensure_dir;
use crate::probe::MediaInfo;

/// Cover file name inside a job's output directory.
pub const COVER_FILE: &str = "cover.jpg";

/// Output frame geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderGeometry {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl RenderGeometry {
    pub fn new(aspect: AspectRatio, target_height: u32, fps: u32) -> Self {
        let (width, height) = aspect.output_dimensions(target_height);
        Self {
            width,
            height,
            fps: fps.max(1),
        }
    }

    /// `reel_<W>x<H>.mp4`
    pub fn reel_file_name(&self) -> String {
        format!("reel_{}x{}.mp4", self.width, self.height)
    }
}

/// A single-clip render request.
#[derive(Debug, Clone)]
pub struct RenderSpec {
    /// Local source file
    pub input: PathBuf,
    /// Probe result for the source (may be defaults)
    pub info: MediaInfo,
    /// Window start in seconds
    pub start: f64,
    /// Window end in seconds
    pub end: f64,
    /// Directory receiving the reel and cover
    pub output_dir: PathBuf,
    /// Optional music bed
    pub music: Option<MusicSpec>,
}

/// Files produced by a render.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderOutput {
    /// Final reel
    pub video: PathBuf,
    /// Cover JPEG
    pub cover: PathBuf,
    /// Nominal output duration in seconds
    pub duration: f64,
    /// Start of each source segment on the output timeline
    pub timeline_offsets: Vec<f64>,
}

/// One clip pass: which part of which source, and how to finish it.
pub(crate) struct ClipPass<'a> {
    pub input: &'a Path,
    pub info: &'a MediaInfo,
    pub start: f64,
    pub duration: f64,
    pub output: &'a Path,
    /// Filters applied after rotation correction
    pub video_chain: FilterChain,
    /// Loudness-normalize program audio (music beds always are)
    pub loudness: bool,
    /// Filters applied last to the output audio
    pub audio_tail: FilterChain,
    pub music: Option<&'a MusicSpec>,
}

/// Drives FFmpeg to produce reels of one geometry and encoding.
#[derive(Debug, Clone)]
pub struct Renderer {
    pub(crate) runner: FfmpegRunner,
    pub(crate) encoding: EncodingConfig,
    pub(crate) geometry: RenderGeometry,
}

impl Renderer {
    pub fn new(runner: FfmpegRunner, encoding: EncodingConfig, geometry: RenderGeometry) -> Self {
        Self {
            runner,
            encoding,
            geometry,
        }
    }

    pub fn geometry(&self) -> RenderGeometry {
        self.geometry
    }

    pub fn runner(&self) -> &FfmpegRunner {
        &self.runner
    }

    /// Render one window of one source into `reel_<W>x<H>.mp4` plus a cover.
    pub async fn render_single(&self, spec: &RenderSpec) -> MediaResult<RenderOutput> {
        let duration = spec.end - spec.start;
        if !(duration > 0.0) || spec.start < 0.0 {
            return Err(MediaError::InvalidVideo(format!(
                "empty render window [{:.3}, {:.3})",
                spec.start, spec.end
            )));
        }

        ensure_dir(&spec.output_dir).await?;
        let video = spec.output_dir.join(self.geometry.reel_file_name());
        let cover = spec.output_dir.join(COVER_FILE);

        info!(
            input = %spec.input.display(),
            start = spec.start,
            duration,
            rotation = spec.info.rotation,
            width = self.geometry.width,
            height = self.geometry.height,
            "Rendering single clip"
        );

        let pass = ClipPass {
            input: &spec.input,
            info: &spec.info,
            start: spec.start,
            duration,
            output: &video,
            video_chain: aspect_chain(
                self.geometry.width,
                self.geometry.height,
                self.geometry.fps,
                spec.info.upright_dimensions(),
            ),
            loudness: true,
            audio_tail: FilterChain::audio(),
            music: spec.music.as_ref(),
        };
        self.runner.run(&self.clip_command(&pass)).await?;

        extract_cover(&self.runner, &video, &cover, duration, &self.geometry).await?;

        Ok(RenderOutput {
            video,
            cover,
            duration,
            timeline_offsets: vec![0.0],
        })
    }

    /// Build the command for one trimmed, rotation-corrected clip.
    ///
    /// Sources without audio get a silent track so every output has one.
    pub(crate) fn clip_command(&self, pass: &ClipPass<'_>) -> FfmpegCommand {
        let mut source = FfmpegInput::file(pass.input);
        if pass.info.rotation != 0 {
            source = source.no_autorotate();
        }
        let source = source.seek(pass.start).duration(pass.duration);

        let mut cmd = FfmpegCommand::with_input(source, pass.output);

        let music_only = pass.music.is_some_and(|m| m.music_only);
        let program = if music_only {
            None
        } else if pass.info.has_audio {
            Some(Pad::input(0, StreamKind::Audio))
        } else {
            let index = cmd.input_count();
            let silence = silent_audio_source(pass.info.sample_rate);
            cmd = cmd.add_input(FfmpegInput::lavfi(silence).duration(pass.duration));
            Some(Pad::input(index, StreamKind::Audio))
        };

        let v_out = Pad::label("vout");
        let a_out = Pad::label("aout");
        let mut graph = FilterGraph::new().node(
            [Pad::input(0, StreamKind::Video)],
            rotation_chain(pass.info.rotation).then(pass.video_chain.clone()),
            [v_out.clone()],
        );

        let mut mapped_audio = true;
        graph = match (pass.music, program) {
            (Some(music), program) => {
                let index = cmd.input_count();
                cmd = cmd.add_input(music.input(pass.duration));
                let music_pad = Pad::input(index, StreamKind::Audio);
                if pass.audio_tail.is_empty() {
                    let mix =
                        music_mix_graph(program, music_pad, music, pass.duration, a_out.clone());
                    graph.merge(mix)
                } else {
                    let mixed = Pad::label("mixed");
                    let mix =
                        music_mix_graph(program, music_pad, music, pass.duration, mixed.clone());
                    graph
                        .merge(mix)
                        .node([mixed], pass.audio_tail.clone(), [a_out.clone()])
                }
            }
            (None, Some(program)) => {
                let mut chain = audio_format_chain();
                if pass.loudness {
                    chain = chain.then(loudness_chain());
                }
                graph.node([program], chain.then(pass.audio_tail.clone()), [a_out.clone()])
            }
            (None, None) => {
                mapped_audio = false;
                graph
            }
        };

        let mut cmd = cmd.filter_complex(graph.to_string()).map(v_out.map_arg());
        if mapped_audio {
            cmd = cmd.map(a_out.map_arg());
        }
        cmd.output_args(self.encoding.to_ffmpeg_args())
            .output_arg("-metadata:s:v:0")
            .output_arg("rotate=0")
            .duration(pass.duration)
            .faststart()
    }
}
