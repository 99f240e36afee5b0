//! Per-job processing pipeline.
//!
//! Resolves sources into the job's temp dir, picks windows with the motion
//! scorer, renders the reel and cover into the job's output dir, and writes
//! `timeline.json`. Returns the public artifact paths.

use std::cmp::Ordering;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use reel_media::fs_utils::{ensure_dir, write_json_atomic};
use reel_media::{
    list_directory_videos, probe_or_default, score_motion_segments, MediaError, MediaFetcher,
    MediaInfo, MontageClip, MontageSpec, MusicSpec, RenderOutput, RenderSpec, Renderer,
    ScorerOptions,
};
use reel_models::{ArtifactPaths, CandidateWindow, Job, JobId, JobRequest, ReelMode, Segment};

use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::logging::JobLogger;

/// Timeline file name inside a job's output directory.
pub const TIMELINE_FILE: &str = "timeline.json";

/// A source reference and the local file it resolved to.
#[derive(Debug, Clone)]
struct SourceFile {
    reference: String,
    path: PathBuf,
}

/// Contents of `timeline.json`.
#[derive(Debug, Clone, Serialize)]
pub struct Timeline {
    pub job_id: JobId,
    pub mode: ReelMode,
    pub width: u32,
    pub height: u32,
    pub duration: f64,
    pub segments: Vec<TimelineSegment>,
}

/// One source window placed on the output timeline.
#[derive(Debug, Clone, Serialize)]
pub struct TimelineSegment {
    pub source: String,
    pub start: f64,
    pub end: f64,
    pub score: f64,
    pub timeline_offset: f64,
}

/// Result of one rendering mode before artifacts are published.
struct Rendered {
    output: RenderOutput,
    segments: Vec<TimelineSegment>,
    candidates: Vec<CandidateWindow>,
}

/// Runs one job end to end. Cheap to clone.
#[derive(Debug, Clone)]
pub struct JobPipeline {
    config: Arc<WorkerConfig>,
    fetcher: MediaFetcher,
}

impl JobPipeline {
    pub fn new(config: Arc<WorkerConfig>) -> Self {
        let fetcher = MediaFetcher::new(config.download_timeout);
        Self { config, fetcher }
    }

    /// Process `job` and return its public artifact paths.
    pub async fn run(&self, job: &Job) -> WorkerResult<ArtifactPaths> {
        let request = &job.request;
        let logger = JobLogger::new(&job.id, request.mode.as_str());
        let temp_dir = self.config.temp_dir(&job.id);
        let output_dir = self.config.output_dir(&job.id);
        ensure_dir(&temp_dir).await?;
        ensure_dir(&output_dir).await?;

        let sources = self.acquire(request, &temp_dir).await?;
        logger.log_progress(&format!("resolved {} source(s)", sources.len()));

        let music = match request.music_ref() {
            Some(reference) => Some(MusicSpec {
                path: self.fetcher.resolve_source(reference, &temp_dir).await?,
                gain_db: request.music_gain_db,
                duck: request.duck_music,
                music_only: request.music_only,
            }),
            None => None,
        };

        let geometry = self.config.geometry(request.aspect);
        let renderer = Renderer::new(self.config.runner(), self.config.encoding.clone(), geometry);

        let rendered = match request.mode {
            ReelMode::Single => {
                self.render_single(&renderer, &logger, request, &sources[0], music, &output_dir)
                    .await?
            }
            ReelMode::Montage => {
                self.render_montage(&renderer, &logger, request, &sources, music, &output_dir)
                    .await?
            }
        };

        let timeline = Timeline {
            job_id: job.id.clone(),
            mode: request.mode,
            width: geometry.width,
            height: geometry.height,
            duration: rendered.output.duration,
            segments: rendered.segments,
        };
        let timeline_path = output_dir.join(TIMELINE_FILE);
        write_json_atomic(&timeline_path, &timeline).await?;

        logger.log_progress(&format!(
            "rendered {}x{} reel, {:.2}s",
            geometry.width, geometry.height, rendered.output.duration
        ));

        Ok(ArtifactPaths {
            best_reel_mp4: Some(self.config.public_url(&rendered.output.video)),
            alt_candidates: rendered.candidates,
            captions_srt: None,
            timeline_json: Some(self.config.public_url(&timeline_path)),
            cover_jpg: Some(self.config.public_url(&rendered.output.cover)),
        })
    }

    /// Directory videos first, then explicit references, capped at
    /// `max_files`. Single mode only fetches the first.
    async fn acquire(
        &self,
        request: &JobRequest,
        temp_dir: &std::path::Path,
    ) -> WorkerResult<Vec<SourceFile>> {
        let mut references = Vec::new();
        if let Some(dir) = request.directory.as_deref().filter(|d| !d.trim().is_empty()) {
            let dir = self.config.resolve_directory(dir);
            for path in list_directory_videos(&dir, request.max_files).await? {
                references.push(path.to_string_lossy().to_string());
            }
        }
        references.extend(request.source_refs());

        let limit = match request.mode {
            ReelMode::Single => 1,
            ReelMode::Montage => request.max_files,
        };
        references.truncate(limit);
        if references.is_empty() {
            return Err(MediaError::NoSources.into());
        }

        let paths = self.fetcher.resolve_sources(&references, temp_dir).await?;
        Ok(references
            .into_iter()
            .zip(paths)
            .map(|(reference, path)| SourceFile { reference, path })
            .collect())
    }

    fn scorer_options(&self) -> ScorerOptions {
        ScorerOptions {
            fps: self.config.scorer_fps,
            cache_dir: Some(self.config.cache_dir()),
        }
    }

    async fn probe(&self, source: &SourceFile) -> MediaInfo {
        probe_or_default(&self.config.ffprobe_bin, &source.path).await
    }

    async fn render_single(
        &self,
        renderer: &Renderer,
        logger: &JobLogger,
        request: &JobRequest,
        source: &SourceFile,
        music: Option<MusicSpec>,
        output_dir: &std::path::Path,
    ) -> WorkerResult<Rendered> {
        let info = self.probe(source).await;
        let target = single_window_length(request.clamped_target_duration(), info.duration);

        let scored = score_motion_segments(
            renderer.runner(),
            &source.path,
            target,
            request.top_k_candidates.max(1),
            &self.scorer_options(),
        )
        .await;
        let best = match scored.first() {
            Some(best) => best.clone(),
            None => {
                logger.log_warning("motion scoring unavailable, cutting from the start");
                Segment::unscored(&source.path, 0.0, target)
            }
        };

        let output = renderer
            .render_single(&RenderSpec {
                input: source.path.clone(),
                info,
                start: best.start,
                end: best.end,
                output_dir: output_dir.to_path_buf(),
                music,
            })
            .await?;

        Ok(Rendered {
            segments: vec![TimelineSegment {
                source: source.reference.clone(),
                start: best.start,
                end: best.end,
                score: best.score,
                timeline_offset: 0.0,
            }],
            candidates: scored.iter().map(CandidateWindow::from).collect(),
            output,
        })
    }

    async fn render_montage(
        &self,
        renderer: &Renderer,
        logger: &JobLogger,
        request: &JobRequest,
        sources: &[SourceFile],
        music: Option<MusicSpec>,
        output_dir: &std::path::Path,
    ) -> WorkerResult<Rendered> {
        let segment_sec = request.per_segment_sec;
        let options = self.scorer_options();

        // (source index, probe, window)
        let mut picks: Vec<(usize, MediaInfo, Segment)> = Vec::new();
        let mut candidates = Vec::new();

        if let [source] = sources {
            let info = self.probe(source).await;
            let count = montage_window_count(request.clamped_target_duration(), segment_sec);
            let mut windows = score_motion_segments(
                renderer.runner(),
                &source.path,
                segment_sec,
                count,
                &options,
            )
            .await;
            candidates.extend(windows.iter().map(CandidateWindow::from));
            if windows.is_empty() {
                logger.log_warning("motion scoring unavailable, using consecutive windows");
                windows = fallback_windows(&source.path, info.duration, segment_sec, count);
            }
            windows.sort_by(|a, b| a.start.partial_cmp(&b.start).unwrap_or(Ordering::Equal));
            picks.extend(windows.into_iter().map(|w| (0, info.clone(), w)));
        } else {
            for (index, source) in sources.iter().enumerate() {
                let info = self.probe(source).await;
                let best = score_motion_segments(
                    renderer.runner(),
                    &source.path,
                    segment_sec,
                    1,
                    &options,
                )
                .await
                    .into_iter()
                    .next();
                if let Some(window) = &best {
                    candidates.push(CandidateWindow::from(window));
                }
                let window = best.unwrap_or_else(|| {
                    logger.log_warning(&format!(
                        "motion scoring unavailable for {}, cutting from the start",
                        source.reference
                    ));
                    Segment::unscored(&source.path, 0.0, segment_sec)
                });
                picks.push((index, info, window));
            }
        }

        let spec = MontageSpec {
            clips: picks
                .iter()
                .map(|(index, info, window)| MontageClip {
                    input: sources[*index].path.clone(),
                    info: info.clone(),
                    start: window.start,
                })
                .collect(),
            segment_sec,
            crossfade: request.effective_crossfade(),
            output_dir: output_dir.to_path_buf(),
            music,
        };
        let output = renderer.render_montage(&spec).await?;

        let segments = picks
            .iter()
            .zip(output.timeline_offsets.iter())
            .map(|((index, _, window), offset)| TimelineSegment {
                source: sources[*index].reference.clone(),
                start: window.start,
                end: window.start + segment_sec,
                score: window.score,
                timeline_offset: *offset,
            })
            .collect();

        Ok(Rendered {
            output,
            segments,
            candidates,
        })
    }
}

/// Reel length for a single clip: the clamped target, cut short by a known
/// shorter source.
pub fn single_window_length(clamped_target: f64, source_duration: Option<f64>) -> f64 {
    match source_duration {
        Some(d) if d > 0.0 => clamped_target.min(d),
        _ => clamped_target,
    }
}

/// Windows taken from a lone montage source.
pub fn montage_window_count(target: f64, segment_sec: f64) -> usize {
    if !(segment_sec > 0.0) {
        return 1;
    }
    ((target / segment_sec).ceil() as usize).max(1)
}

/// Consecutive windows from the start of a source, as many as fit a known
/// duration (always at least one).
pub fn fallback_windows(
    path: &std::path::Path,
    duration: Option<f64>,
    segment_sec: f64,
    count: usize,
) -> Vec<Segment> {
    let fit = match duration {
        Some(d) if d > 0.0 => ((d / segment_sec).floor() as usize).max(1),
        _ => count,
    };
    (0..count.min(fit).max(1))
        .map(|i| {
            let start = i as f64 * segment_sec;
            Segment::unscored(path, start, start + segment_sec)
        })
        .collect()
}
