//! Shared fixtures for worker integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use reel_models::{Job, JobRequest};
use reel_worker::{JobManager, WorkerConfig};
use tempfile::TempDir;

/// Small frames keep FFmpeg-backed tests fast.
pub const TEST_TARGET_HEIGHT: u32 = 320;

pub fn manager(root: &TempDir) -> JobManager {
    let mut config = WorkerConfig::default().with_uploads_root(root.path());
    config.target_height = TEST_TARGET_HEIGHT;
    config.fps = 15;
    let manager = JobManager::new(config);
    manager.start();
    manager
}

/// Submit and wait for the job to finish.
pub async fn run(manager: &JobManager, request: JobRequest) -> Job {
    let response = manager.submit(request).await.expect("submit failed");
    tokio::time::timeout(
        Duration::from_secs(120),
        manager.wait_for_terminal(&response.job_id, Duration::from_millis(20)),
    )
    .await
    .expect("job did not finish in time")
    .expect("job vanished")
}

/// Options for a generated test clip.
#[derive(Debug, Clone, Copy)]
pub struct ClipOptions {
    pub width: u32,
    pub height: u32,
    pub seconds: f64,
    pub audio: bool,
    /// Display rotation to tag the clip with
    pub rotation: Option<u32>,
}

impl Default for ClipOptions {
    fn default() -> Self {
        Self {
            width: 320,
            height: 180,
            seconds: 3.0,
            audio: true,
            rotation: None,
        }
    }
}

async fn ffmpeg(args: &[String]) {
    let output = tokio::process::Command::new("ffmpeg")
        .args(args)
        .output()
        .await
        .expect("ffmpeg not runnable");
    assert!(
        output.status.success(),
        "fixture generation failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

/// Generate a `testsrc` clip (with a sine tone when `audio` is set).
pub async fn make_clip(dir: &Path, name: &str, options: ClipOptions) -> PathBuf {
    let path = dir.join(name);
    let encoded = match options.rotation {
        Some(_) => dir.join(format!("unrotated_{}", name)),
        None => path.clone(),
    };

    let mut args = strings(&["-y", "-hide_banner", "-v", "error", "-f", "lavfi", "-i"]);
    args.push(format!(
        "testsrc=size={}x{}:rate=30:duration={}",
        options.width, options.height, options.seconds
    ));
    if options.audio {
        args.extend(strings(&["-f", "lavfi", "-i"]));
        args.push(format!("sine=frequency=440:sample_rate=44100:duration={}", options.seconds));
    }
    // 4:2:0 needs even dimensions
    let pix_fmt = if options.width % 2 == 0 && options.height % 2 == 0 {
        "yuv420p"
    } else {
        "yuv444p"
    };
    args.extend(strings(&["-c:v", "libx264", "-preset", "ultrafast", "-pix_fmt", pix_fmt]));
    if options.audio {
        args.extend(strings(&["-c:a", "aac", "-shortest"]));
    }
    args.push(encoded.to_string_lossy().to_string());
    ffmpeg(&args).await;

    if let Some(rotation) = options.rotation {
        let mut args = strings(&["-y", "-hide_banner", "-v", "error", "-display_rotation:v:0"]);
        args.push(rotation.to_string());
        args.push("-i".into());
        args.push(encoded.to_string_lossy().to_string());
        args.extend(strings(&["-c", "copy"]));
        args.push(path.to_string_lossy().to_string());
        ffmpeg(&args).await;
    }
    path
}

/// Generate a sine music track.
pub async fn make_music(dir: &Path, seconds: f64) -> PathBuf {
    let path = dir.join("music.m4a");
    let mut args = strings(&["-y", "-hide_banner", "-v", "error", "-f", "lavfi", "-i"]);
    args.push(format!("sine=frequency=220:sample_rate=48000:duration={}", seconds));
    args.extend(strings(&["-c:a", "aac"]));
    args.push(path.to_string_lossy().to_string());
    ffmpeg(&args).await;
    path
}

/// Local file behind a `/photos/...` artifact URL.
pub fn artifact_path(root: &TempDir, url: &str) -> PathBuf {
    let relative = url.strip_prefix("/photos/").expect("not a public url");
    root.path().join(relative)
}
