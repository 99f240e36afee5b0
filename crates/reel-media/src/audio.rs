//! Background music mixing with optional ducking.

use std::path::{Path, PathBuf};
use tracing::info;

use reel_models::EncodingConfig;

use crate::command::{FfmpegCommand, FfmpegInput, FfmpegRunner};
use crate::error::MediaResult;
use crate::filters::{
    audio_format_chain, loudness_chain, FilterChain, FilterGraph, Pad, StreamKind,
    DUCKING_COMPRESSOR,
};

/// Length of the fade-out at the end of a music bed.
pub const MUSIC_FADE_OUT_SECS: f64 = 1.0;

/// Music bed settings taken from a job request.
#[derive(Debug, Clone, PartialEq)]
pub struct MusicSpec {
    /// Local music file
    pub path: PathBuf,
    /// Gain applied to the music, in dB
    pub gain_db: f64,
    /// Compress the music whenever program audio is present
    pub duck: bool,
    /// Replace program audio entirely
    pub music_only: bool,
}

impl MusicSpec {
    /// Music input looped and trimmed to `duration`.
    pub fn input(&self, duration: f64) -> FfmpegInput {
        FfmpegInput::file(&self.path).loop_forever().duration(duration)
    }
}

/// Build the audio graph mixing `program` with `music` into `output`.
///
/// Without program audio, or with `music_only`, the output is the
/// gain-adjusted music alone. Both paths end loudness-normalized.
pub fn music_mix_graph(
    program: Option<Pad>,
    music: Pad,
    spec: &MusicSpec,
    duration: f64,
    output: Pad,
) -> FilterGraph {
    let fade_len = MUSIC_FADE_OUT_SECS.min(duration.max(0.0));
    let bed_chain = audio_format_chain()
        .filter(format!("volume={:.2}dB", spec.gain_db))
        .filter(format!(
            "afade=t=out:st={:.3}:d={:.3}",
            (duration - fade_len).max(0.0),
            fade_len
        ));

    let program = match program {
        Some(pad) if !spec.music_only => pad,
        _ => {
            return FilterGraph::new().node([music], bed_chain.then(loudness_chain()), [output]);
        }
    };

    let bed = Pad::label("bed");
    let prog = Pad::label("prog");
    let graph = FilterGraph::new().node([music], bed_chain, [bed.clone()]);

    let (graph, bed) = if spec.duck {
        let key = Pad::label("key");
        let ducked = Pad::label("ducked");
        let graph = graph
            .node(
                [program],
                audio_format_chain().filter("asplit=2"),
                [prog.clone(), key.clone()],
            )
            .node(
                [bed, key],
                FilterChain::audio().filter(DUCKING_COMPRESSOR),
                [ducked.clone()],
            );
        (graph, ducked)
    } else {
        let graph = graph.node([program], audio_format_chain(), [prog.clone()]);
        (graph, bed)
    };

    graph.node(
        [prog, bed],
        FilterChain::audio()
            .filter("amix=inputs=2:duration=first:normalize=0:dropout_transition=0")
            .then(loudness_chain()),
        [output],
    )
}

/// Overlay a music bed on an already-assembled video, copying the video
/// stream untouched.
pub async fn mix_music(
    runner: &FfmpegRunner,
    encoding: &EncodingConfig,
    video: &Path,
    music: &MusicSpec,
    duration: f64,
    output: &Path,
) -> MediaResult<()> {
    info!(
        video = %video.display(),
        music = %music.path.display(),
        duck = music.duck,
        music_only = music.music_only,
        "Mixing music"
    );

    let out = Pad::label("aout");
    let graph = music_mix_graph(
        Some(Pad::input(0, StreamKind::Audio)),
        Pad::input(1, StreamKind::Audio),
        music,
        duration,
        out.clone(),
    );

    let cmd = FfmpegCommand::new(video, output)
        .add_input(music.input(duration))
        .filter_complex(graph.to_string())
        .map("0:v:0")
        .map(out.map_arg())
        .video_codec("copy")
        .output_args(encoding.audio_args())
        .duration(duration)
        .faststart();

    runner.run(&cmd).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(duck: bool, music_only: bool) -> MusicSpec {
        MusicSpec {
            path: PathBuf::from("song.mp3"),
            gain_db: -8.0,
            duck,
            music_only,
        }
    }

    fn graph(spec: &MusicSpec, program: bool) -> String {
        music_mix_graph(
            program.then(|| Pad::input(0, StreamKind::Audio)),
            Pad::input(1, StreamKind::Audio),
            spec,
            6.0,
            Pad::label("aout"),
        )
        .to_string()
    }

    #[test]
    fn test_ducked_mix() {
        let g = graph(&spec(true, false), true);
        assert!(g.contains("volume=-8.00dB"));
        assert!(g.contains("afade=t=out:st=5.000:d=1.000"));
        assert!(g.contains("asplit=2[prog][key]"));
        assert!(g.contains(&format!("[bed][key]{}[ducked]", DUCKING_COMPRESSOR)));
        assert!(DUCKING_COMPRESSOR.contains("threshold=0.02:ratio=6:attack=5:release=300"));
        assert!(g.contains("[prog][ducked]amix=inputs=2"));
        assert!(g.ends_with("loudnorm=I=-14:TP=-1.5:LRA=11,aresample=48000[aout]"));
    }

    #[test]
    fn test_plain_mix_without_ducking() {
        let g = graph(&spec(false, false), true);
        assert!(!g.contains("sidechaincompress"));
        assert!(!g.contains("asplit"));
        assert!(g.contains(
            "[prog][bed]amix=inputs=2:duration=first:normalize=0:dropout_transition=0"
        ));
    }

    #[test]
    fn test_music_only_drops_program() {
        let g = graph(&spec(true, true), true);
        assert!(g.starts_with("[1:a]"));
        assert!(!g.contains("[0:a]"));
        assert!(!g.contains("amix"));
        assert!(g.ends_with("[aout]"));
    }

    #[test]
    fn test_missing_program_audio_uses_music() {
        let g = graph(&spec(true, false), false);
        assert!(!g.contains("[0:a]"));
        assert!(g.contains("loudnorm"));
    }

    #[test]
    fn test_short_clip_fade() {
        let g = music_mix_graph(
            None,
            Pad::input(1, StreamKind::Audio),
            &spec(false, true),
            0.5,
            Pad::label("a"),
        )
        .to_string();
        assert!(g.contains("afade=t=out:st=0.000:d=0.500"));
    }

    #[test]
    fn test_music_input_loops() {
        let cmd = FfmpegCommand::new("v.mp4", "o.mp4").add_input(spec(true, false).input(6.0));
        let args = cmd.build_args().join(" ");
        assert!(args.contains("-stream_loop -1 -t 6.000 -i song.mp3"));
    }
}
