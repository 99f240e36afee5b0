//! Worker configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reel_media::{FfmpegRunner, RenderGeometry, Toolchain};
use reel_models::encoding::{DEFAULT_FPS, DEFAULT_TARGET_HEIGHT};
use reel_models::{AspectRatio, EncodingConfig, JobId};
use reel_queue::QueueConfig;

/// Public URL prefix for files under the uploads root.
pub const PUBLIC_PREFIX: &str = "/photos";

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Root for job outputs (`reels/`), temp dirs (`tmp/`) and caches
    pub uploads_root: PathBuf,
    /// FFmpeg binary
    pub ffmpeg_bin: PathBuf,
    /// FFprobe binary
    pub ffprobe_bin: PathBuf,
    /// Output frame height
    pub target_height: u32,
    /// Output frame rate
    pub fps: u32,
    /// Motion signal sampling rate
    pub scorer_fps: u32,
    /// Queue depth bound and retention
    pub queue: QueueConfig,
    /// Per-job timeout; `None` waits indefinitely
    pub job_timeout: Option<Duration>,
    /// Per-invocation FFmpeg timeout
    pub ffmpeg_timeout: Option<Duration>,
    /// HTTP download timeout
    pub download_timeout: Duration,
    /// Keep per-job temp dirs after the job finishes
    pub keep_temp: bool,
    /// Encoder settings
    pub encoding: EncodingConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            uploads_root: PathBuf::from("uploads"),
            ffmpeg_bin: PathBuf::from("ffmpeg"),
            ffprobe_bin: PathBuf::from("ffprobe"),
            target_height: DEFAULT_TARGET_HEIGHT,
            fps: DEFAULT_FPS,
            scorer_fps: 10,
            queue: QueueConfig::default(),
            job_timeout: None,
            ffmpeg_timeout: None,
            download_timeout: Duration::from_secs(60),
            keep_temp: false,
            encoding: EncodingConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            uploads_root: std::env::var("UPLOADS_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("uploads")),
            ffmpeg_bin: std::env::var("FFMPEG_BIN")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("ffmpeg")),
            ffprobe_bin: std::env::var("FFPROBE_BIN")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("ffprobe")),
            target_height: std::env::var("REEL_TARGET_HEIGHT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_TARGET_HEIGHT),
            fps: std::env::var("REEL_FPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_FPS),
            scorer_fps: std::env::var("REEL_SCORER_FPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            queue: QueueConfig::from_env(),
            job_timeout: std::env::var("REEL_JOB_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|secs: &u64| *secs > 0)
                .map(Duration::from_secs),
            ffmpeg_timeout: std::env::var("REEL_FFMPEG_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|secs: &u64| *secs > 0)
                .map(Duration::from_secs),
            download_timeout: Duration::from_secs(
                std::env::var("REEL_DOWNLOAD_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
            keep_temp: std::env::var("REEL_KEEP_TEMP")
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            encoding: EncodingConfig::default(),
        }
    }

    /// Same config rooted elsewhere.
    pub fn with_uploads_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.uploads_root = root.into();
        self
    }

    pub fn toolchain(&self) -> Toolchain {
        Toolchain::new(&self.ffmpeg_bin, &self.ffprobe_bin)
    }

    /// FFmpeg runner honoring `ffmpeg_timeout`.
    pub fn runner(&self) -> FfmpegRunner {
        let runner = self.toolchain().runner();
        match self.ffmpeg_timeout {
            Some(limit) => runner.with_timeout(limit.as_secs().max(1)),
            None => runner,
        }
    }

    pub fn geometry(&self, aspect: AspectRatio) -> RenderGeometry {
        RenderGeometry::new(aspect, self.target_height, self.fps)
    }

    /// `<uploads_root>/reels/<id>`
    pub fn output_dir(&self, id: &JobId) -> PathBuf {
        self.uploads_root.join("reels").join(id.as_str())
    }

    /// `<uploads_root>/tmp/<id>`
    pub fn temp_dir(&self, id: &JobId) -> PathBuf {
        self.uploads_root.join("tmp").join(id.as_str())
    }

    /// Motion signal cache.
    pub fn cache_dir(&self) -> PathBuf {
        self.uploads_root.join("cache").join("motion")
    }

    /// Resolve a caller-supplied directory: absolute paths as given, relative
    /// ones under the uploads root when present there.
    pub fn resolve_directory(&self, dir: &str) -> PathBuf {
        let path = PathBuf::from(dir.trim());
        if path.is_absolute() {
            return path;
        }
        let rooted = self.uploads_root.join(&path);
        if rooted.is_dir() {
            rooted
        } else {
            path
        }
    }

    /// `/photos/<path relative to uploads_root>`.
    pub fn public_url(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.uploads_root).unwrap_or(path);
        let parts: Vec<String> = relative
            .components()
            .filter_map(|c| match c {
                std::path::Component::Normal(part) => Some(part.to_string_lossy().to_string()),
                _ => None,
            })
            .collect();
        format!("{}/{}", PUBLIC_PREFIX, parts.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.uploads_root, PathBuf::from("uploads"));
        assert_eq!(config.target_height, 1920);
        assert_eq!(config.fps, 30);
        assert_eq!(config.scorer_fps, 10);
        assert!(config.job_timeout.is_none());
        assert!(config.ffmpeg_timeout.is_none());
        assert_eq!(config.runner().timeout_secs(), None);
        assert_eq!(config.download_timeout, Duration::from_secs(60));
        assert!(!config.keep_temp);
        assert_eq!(config.queue.max_queue_depth, None);
    }

    #[test]
    fn test_job_dirs() {
        let config = WorkerConfig::default().with_uploads_root("/srv/uploads");
        let id = JobId::from_string("r_0123456789");
        assert_eq!(
            config.output_dir(&id),
            PathBuf::from("/srv/uploads/reels/r_0123456789")
        );
        assert_eq!(config.temp_dir(&id), PathBuf::from("/srv/uploads/tmp/r_0123456789"));
    }

    #[test]
    fn test_public_url() {
        let config = WorkerConfig::default().with_uploads_root("/srv/uploads");
        let path = Path::new("/srv/uploads/reels/r_1/reel_1080x1920.mp4");
        assert_eq!(config.public_url(path), "/photos/reels/r_1/reel_1080x1920.mp4");

        let relative = WorkerConfig::default();
        let path = relative.output_dir(&JobId::from_string("r_2")).join("cover.jpg");
        assert_eq!(relative.public_url(&path), "/photos/reels/r_2/cover.jpg");
    }

    #[test]
    fn test_runner_takes_ffmpeg_timeout() {
        let config = WorkerConfig {
            ffmpeg_bin: PathBuf::from("/opt/ffmpeg/bin/ffmpeg"),
            ffmpeg_timeout: Some(Duration::from_secs(90)),
            ..Default::default()
        };
        let runner = config.runner();
        assert_eq!(runner.binary(), Path::new("/opt/ffmpeg/bin/ffmpeg"));
        assert_eq!(runner.timeout_secs(), Some(90));
    }

    #[test]
    fn test_geometry_from_aspect() {
        let config = WorkerConfig::default();
        let g = config.geometry(AspectRatio::SQUARE);
        assert_eq!((g.width, g.height, g.fps), (1920, 1920, 30));
    }

    #[test]
    fn test_resolve_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("batch")).unwrap();
        let config = WorkerConfig::default().with_uploads_root(dir.path());

        assert_eq!(config.resolve_directory("batch"), dir.path().join("batch"));
        assert_eq!(config.resolve_directory("/abs/clips"), PathBuf::from("/abs/clips"));
        assert_eq!(config.resolve_directory("elsewhere"), PathBuf::from("elsewhere"));
    }
}
