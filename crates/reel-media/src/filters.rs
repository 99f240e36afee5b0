//! FFmpeg filter graph construction.
//!
//! Graphs are assembled from [`FilterChain`]s connected through labelled
//! [`Pad`]s instead of ad-hoc string concatenation.

use std::fmt;

use reel_models::encoding::{DEFAULT_PIXEL_FORMAT, DEFAULT_SAMPLE_RATE};

/// Loudness target applied to every rendered reel.
pub const LOUDNORM: &str = "loudnorm=I=-14:TP=-1.5:LRA=11";

/// Even-dimension scale used by the normalization pass.
pub const SCALE_EVEN: &str = "scale=trunc(iw/2)*2:trunc(ih/2)*2";

/// Sidechain compressor settings used for music ducking.
pub const DUCKING_COMPRESSOR: &str =
    "sidechaincompress=threshold=0.02:ratio=6:attack=5:release=300";

/// Whether a chain processes video or audio frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Video,
    Audio,
}

impl StreamKind {
    fn specifier(self) -> char {
        match self {
            StreamKind::Video => 'v',
            StreamKind::Audio => 'a',
        }
    }

    fn passthrough(self) -> &'static str {
        match self {
            StreamKind::Video => "null",
            StreamKind::Audio => "anull",
        }
    }
}

/// A comma-separated sequence of filters, e.g. `scale=-2:1920,crop=1080:1920`.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterChain {
    kind: StreamKind,
    filters: Vec<String>,
}

impl FilterChain {
    pub fn video() -> Self {
        Self {
            kind: StreamKind::Video,
            filters: Vec::new(),
        }
    }

    pub fn audio() -> Self {
        Self {
            kind: StreamKind::Audio,
            filters: Vec::new(),
        }
    }

    /// Append one filter.
    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filters.push(filter.into());
        self
    }

    /// Append every filter of another chain.
    pub fn then(mut self, other: FilterChain) -> Self {
        self.filters.extend(other.filters);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

impl fmt::Display for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.filters.is_empty() {
            f.write_str(self.kind.passthrough())
        } else {
            f.write_str(&self.filters.join(","))
        }
    }
}

/// A stream reference inside a filter graph, rendered as `[label]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pad(String);

impl Pad {
    /// A stream of an input file, e.g. `[1:a]`.
    pub fn input(index: usize, kind: StreamKind) -> Self {
        Self(format!("{}:{}", index, kind.specifier()))
    }

    /// A named intermediate or output label.
    pub fn label(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The bracketed form used by `-map`.
    pub fn map_arg(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Pad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct FilterNode {
    inputs: Vec<Pad>,
    chain: FilterChain,
    outputs: Vec<Pad>,
}

/// A `;`-separated filter graph for `-filter_complex`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterGraph {
    nodes: Vec<FilterNode>,
}

impl FilterGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect `inputs` through `chain` to `outputs`.
    pub fn node(
        mut self,
        inputs: impl IntoIterator<Item = Pad>,
        chain: FilterChain,
        outputs: impl IntoIterator<Item = Pad>,
    ) -> Self {
        self.nodes.push(FilterNode {
            inputs: inputs.into_iter().collect(),
            chain,
            outputs: outputs.into_iter().collect(),
        });
        self
    }

    /// Merge another graph's statements after this one's.
    pub fn merge(mut self, other: FilterGraph) -> Self {
        self.nodes.extend(other.nodes);
        self
    }
}

impl fmt::Display for FilterGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, node) in self.nodes.iter().enumerate() {
            if i > 0 {
                f.write_str(";")?;
            }
            for pad in &node.inputs {
                write!(f, "{}", pad)?;
            }
            write!(f, "{}", node.chain)?;
            for pad in &node.outputs {
                write!(f, "{}", pad)?;
            }
        }
        Ok(())
    }
}

/// Undo a clockwise display rotation; rotation precedes any cropping.
pub fn rotation_chain(rotation: u32) -> FilterChain {
    let chain = FilterChain::video();
    match rotation {
        90 => chain.filter("transpose=1"),
        270 => chain.filter("transpose=2"),
        180 => chain.filter("hflip").filter("vflip"),
        _ => chain,
    }
}

/// Fit a frame to exactly `width`x`height`.
///
/// The source is scaled to the target height, then center-cropped, or padded
/// when its scaled width falls short. `upright` is the source size after
/// rotation; without it a width-safe cover-and-crop expression is used.
pub fn aspect_chain(width: u32, height: u32, fps: u32, upright: Option<(u32, u32)>) -> FilterChain {
    let chain = FilterChain::video();
    let chain = match upright {
        Some((src_w, src_h)) => {
            let scaled_w = scaled_width(src_w, src_h, height);
            let chain = chain.filter(format!("scale=-2:{}", height));
            if scaled_w < width {
                chain.filter(format!("pad={}:{}:(ow-iw)/2:(oh-ih)/2", width, height))
            } else {
                chain.filter(format!("crop={}:{}", width, height))
            }
        }
        None => chain
            .filter(format!(
                "scale={}:{}:force_original_aspect_ratio=increase",
                width, height
            ))
            .filter(format!("crop={}:{}", width, height)),
    };
    chain
        .filter("setsar=1")
        .filter(format!("fps={}", fps))
        .filter(format!("format={}", DEFAULT_PIXEL_FORMAT))
}

/// Width produced by `scale=-2:<target_height>` (kept even).
pub fn scaled_width(src_w: u32, src_h: u32, target_height: u32) -> u32 {
    if src_h == 0 {
        return 0;
    }
    let exact = src_w as f64 * target_height as f64 / src_h as f64;
    let even = (exact / 2.0).round() as u32 * 2;
    even.max(2)
}

/// Constant frame rate, even dimensions and a standard pixel format.
pub fn normalize_chain(fps: u32) -> FilterChain {
    FilterChain::video()
        .filter(format!("fps={}", fps))
        .filter(SCALE_EVEN)
        .filter("setsar=1")
        .filter(format!("format={}", DEFAULT_PIXEL_FORMAT))
}

/// Resample to the reel rate and force stereo float samples.
pub fn audio_format_chain() -> FilterChain {
    FilterChain::audio()
        .filter(format!("aresample={}", DEFAULT_SAMPLE_RATE))
        .filter("aformat=sample_fmts=fltp:channel_layouts=stereo")
}

/// Loudness normalization followed by a resample back to the reel rate.
pub fn loudness_chain() -> FilterChain {
    FilterChain::audio()
        .filter(LOUDNORM)
        .filter(format!("aresample={}", DEFAULT_SAMPLE_RATE))
}

/// `anullsrc` graph producing silent stereo audio at `sample_rate`.
pub fn silent_audio_source(sample_rate: Option<u32>) -> String {
    format!(
        "anullsrc=channel_layout=stereo:sample_rate={}",
        sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE)
    )
}

/// `xfade` offsets for segments of the given durations, and the total
/// output duration.
///
/// Each offset is the running cumulative duration minus the crossfade; the
/// cumulative then grows by the next segment's duration minus the crossfade.
pub fn crossfade_offsets(durations: &[f64], crossfade: f64) -> (Vec<f64>, f64) {
    let Some((first, rest)) = durations.split_first() else {
        return (Vec::new(), 0.0);
    };
    let mut offsets = Vec::with_capacity(rest.len());
    let mut cumulative = *first;
    for duration in rest {
        offsets.push((cumulative - crossfade).max(0.0));
        cumulative += duration - crossfade;
    }
    (offsets, cumulative)
}

/// Chain `n` inputs (`[i:v]`/`[i:a]`) with `xfade` and `acrossfade`, ending
/// in `[vout]` and `[aout]`.
pub fn crossfade_graph(durations: &[f64], crossfade: f64) -> FilterGraph {
    let (offsets, _) = crossfade_offsets(durations, crossfade);
    let mut graph = FilterGraph::new();
    let mut video = Pad::input(0, StreamKind::Video);
    let mut audio = Pad::input(0, StreamKind::Audio);

    for (i, offset) in offsets.iter().enumerate() {
        let next = i + 1;
        let last = next == offsets.len();
        let (v_out, a_out) = if last {
            (Pad::label("vout"), Pad::label("aout"))
        } else {
            (Pad::label(format!("xv{}", next)), Pad::label(format!("xa{}", next)))
        };

        graph = graph
            .node(
                [video, Pad::input(next, StreamKind::Video)],
                FilterChain::video().filter(format!(
                    "xfade=transition=fade:duration={:.3}:offset={:.3}",
                    crossfade, offset
                )),
                [v_out.clone()],
            )
            .node(
                [audio, Pad::input(next, StreamKind::Audio)],
                FilterChain::audio().filter(format!("acrossfade=d={:.3}", crossfade)),
                [a_out.clone()],
            );
        video = v_out;
        audio = a_out;
    }
    graph
}
