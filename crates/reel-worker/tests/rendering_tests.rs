//! End-to-end rendering tests against a real FFmpeg.

mod common;

use std::str::FromStr;

use common::{artifact_path, make_clip, make_music, ClipOptions, TEST_TARGET_HEIGHT};
use reel_media::probe_media;
use reel_models::{AspectRatio, Job, JobRequest, JobStatus, ReelMode};
use tempfile::TempDir;

fn assert_completed(job: &Job) {
    assert_eq!(job.status, JobStatus::Completed, "job failed: {:?}", job.error);
}

#[tokio::test]
#[ignore = "requires FFmpeg"]
async fn test_single_clip_reel_with_cover() {
    let root = TempDir::new().unwrap();
    let source = make_clip(
        root.path(),
        "ten.mp4",
        ClipOptions {
            seconds: 10.0,
            ..Default::default()
        },
    )
    .await;
    let manager = common::manager(&root);

    let request = JobRequest {
        target_duration_sec: 5.0,
        ..JobRequest::for_video(source.to_string_lossy())
    };
    let job = common::run(&manager, request).await;
    assert_completed(&job);

    let artifacts = &job.artifacts;
    let reel_url = artifacts.best_reel_mp4.as_deref().unwrap();
    assert!(reel_url.starts_with(&format!("/photos/reels/{}/reel_", job.id)));
    assert!(artifact_path(&root, artifacts.cover_jpg.as_deref().unwrap()).exists());
    assert!(artifact_path(&root, artifacts.timeline_json.as_deref().unwrap()).exists());
    assert!(artifacts.captions_srt.is_none());
    assert!(!artifacts.alt_candidates.is_empty());

    let info = probe_media("ffprobe", artifact_path(&root, reel_url)).await.unwrap();
    let duration = info.duration.unwrap();
    assert!((duration - 5.0).abs() < 0.3, "duration {}", duration);
    assert!(info.has_audio);

    // Temp dir is gone, output dir stays
    assert!(!manager.config().temp_dir(&job.id).exists());
}

#[tokio::test]
#[ignore = "requires FFmpeg"]
async fn test_montage_concat_of_two_clips() {
    let root = TempDir::new().unwrap();
    let a = make_clip(root.path(), "a.mp4", ClipOptions::default()).await;
    let b = make_clip(
        root.path(),
        "b.mp4",
        ClipOptions {
            width: 180,
            height: 320,
            ..Default::default()
        },
    )
    .await;
    let manager = common::manager(&root);

    let request = JobRequest {
        per_segment_sec: 3.0,
        ..JobRequest::montage([a.to_string_lossy(), b.to_string_lossy()])
    };
    let job = common::run(&manager, request).await;
    assert_completed(&job);

    let reel = artifact_path(&root, job.artifacts.best_reel_mp4.as_deref().unwrap());
    let info = probe_media("ffprobe", &reel).await.unwrap();
    let duration = info.duration.unwrap();
    assert!((duration - 6.0).abs() < 0.4, "duration {}", duration);

    let timeline_path = artifact_path(&root, job.artifacts.timeline_json.as_deref().unwrap());
    let timeline: serde_json::Value =
        serde_json::from_slice(&std::fs::read(timeline_path).unwrap()).unwrap();
    assert_eq!(timeline["mode"], "montage");
    assert_eq!(timeline["segments"].as_array().unwrap().len(), 2);
    assert_eq!(timeline["segments"][0]["source"], a.to_string_lossy().as_ref());
    assert_eq!(timeline["segments"][1]["source"], b.to_string_lossy().as_ref());
    assert_eq!(timeline["segments"][0]["timeline_offset"], 0.0);
    assert_eq!(timeline["segments"][1]["timeline_offset"], 3.0);
}

#[tokio::test]
#[ignore = "requires FFmpeg"]
async fn test_montage_of_rotated_and_odd_sized_clips() {
    let root = TempDir::new().unwrap();
    let rotated = make_clip(
        root.path(),
        "rotated.mp4",
        ClipOptions {
            rotation: Some(90),
            ..Default::default()
        },
    )
    .await;
    // Odd width narrower than the 9:16 frame once scaled
    let odd = make_clip(
        root.path(),
        "odd.mp4",
        ClipOptions {
            width: 181,
            height: 321,
            ..Default::default()
        },
    )
    .await;
    let manager = common::manager(&root);

    let request = JobRequest {
        per_segment_sec: 2.0,
        ..JobRequest::montage([rotated.to_string_lossy(), odd.to_string_lossy()])
    };
    let job = common::run(&manager, request).await;
    assert_completed(&job);

    let (width, height) = AspectRatio::default().output_dimensions(TEST_TARGET_HEIGHT);
    let reel = artifact_path(&root, job.artifacts.best_reel_mp4.as_deref().unwrap());
    let info = probe_media("ffprobe", &reel).await.unwrap();
    assert_eq!((info.width, info.height), (Some(width), Some(height)));
    assert_eq!(info.rotation, 0);
    let duration = info.duration.unwrap();
    assert!((duration - 4.0).abs() < 0.4, "duration {}", duration);
}

#[tokio::test]
#[ignore = "requires FFmpeg"]
async fn test_montage_crossfade_duration() {
    let root = TempDir::new().unwrap();
    let a = make_clip(root.path(), "a.mp4", ClipOptions::default()).await;
    let b = make_clip(root.path(), "b.mp4", ClipOptions::default()).await;
    let c = make_clip(root.path(), "c.mp4", ClipOptions::default()).await;
    let manager = common::manager(&root);

    let request = JobRequest {
        per_segment_sec: 3.0,
        crossfade_sec: Some(0.5),
        ..JobRequest::montage([a.to_string_lossy(), b.to_string_lossy(), c.to_string_lossy()])
    };
    let job = common::run(&manager, request).await;
    assert_completed(&job);

    let reel = artifact_path(&root, job.artifacts.best_reel_mp4.as_deref().unwrap());
    let duration = probe_media("ffprobe", &reel).await.unwrap().duration.unwrap();
    let expected = 3.0 * 3.0 - 2.0 * 0.5;
    assert!((duration - expected).abs() < 0.4, "duration {}", duration);
}

#[tokio::test]
#[ignore = "requires FFmpeg"]
async fn test_output_dimensions_grid() {
    let root = TempDir::new().unwrap();
    let shape = |width, height, rotation| ClipOptions {
        width,
        height,
        rotation,
        ..Default::default()
    };
    let sources = [
        ("landscape.mp4", shape(320, 180, None)),
        ("landscape_90.mp4", shape(320, 180, Some(90))),
        ("landscape_180.mp4", shape(320, 180, Some(180))),
        ("portrait.mp4", shape(180, 320, None)),
        ("portrait_270.mp4", shape(180, 320, Some(270))),
        ("square.mp4", shape(240, 240, None)),
        ("square_180.mp4", shape(240, 240, Some(180))),
        ("odd.mp4", shape(321, 181, None)),
    ];
    let mut clips = Vec::new();
    for (name, options) in sources {
        clips.push(make_clip(root.path(), name, options).await);
    }
    let manager = common::manager(&root);

    for aspect in ["9:16", "1:1", "16:9"] {
        let aspect = AspectRatio::from_str(aspect).unwrap();
        let (width, height) = aspect.output_dimensions(TEST_TARGET_HEIGHT);
        for clip in &clips {
            let request = JobRequest {
                aspect,
                target_duration_sec: 3.0,
                ..JobRequest::for_video(clip.to_string_lossy())
            };
            let job = common::run(&manager, request).await;
            assert_completed(&job);

            let reel = artifact_path(&root, job.artifacts.best_reel_mp4.as_deref().unwrap());
            let info = probe_media("ffprobe", &reel).await.unwrap();
            assert_eq!(
                (info.width, info.height),
                (Some(width), Some(height)),
                "{} at {}",
                clip.display(),
                aspect
            );
            assert!(reel.ends_with(format!("reel_{}x{}.mp4", width, height)));
        }
    }
}

#[tokio::test]
#[ignore = "requires FFmpeg"]
async fn test_silent_source_gets_audio_track() {
    let root = TempDir::new().unwrap();
    let silent = make_clip(
        root.path(),
        "silent.mp4",
        ClipOptions {
            audio: false,
            ..Default::default()
        },
    )
    .await;
    let manager = common::manager(&root);

    let single = common::run(&manager, JobRequest::for_video(silent.to_string_lossy())).await;
    assert_completed(&single);
    let reel = artifact_path(&root, single.artifacts.best_reel_mp4.as_deref().unwrap());
    assert!(probe_media("ffprobe", &reel).await.unwrap().has_audio);

    let montage = common::run(
        &manager,
        JobRequest {
            mode: ReelMode::Montage,
            per_segment_sec: 1.5,
            ..JobRequest::for_video(silent.to_string_lossy())
        },
    )
    .await;
    assert_completed(&montage);
    let reel = artifact_path(&root, montage.artifacts.best_reel_mp4.as_deref().unwrap());
    assert!(probe_media("ffprobe", &reel).await.unwrap().has_audio);
}

#[tokio::test]
#[ignore = "requires FFmpeg"]
async fn test_music_bed_with_ducking() {
    let root = TempDir::new().unwrap();
    let clip = make_clip(
        root.path(),
        "clip.mp4",
        ClipOptions {
            seconds: 4.0,
            ..Default::default()
        },
    )
    .await;
    // Shorter than the reel so it has to loop
    let music = make_music(root.path(), 2.0).await;
    let manager = common::manager(&root);

    let request = JobRequest {
        target_duration_sec: 4.0,
        music_url: Some(music.to_string_lossy().to_string()),
        ..JobRequest::for_video(clip.to_string_lossy())
    };
    let job = common::run(&manager, request).await;
    assert_completed(&job);

    let reel = artifact_path(&root, job.artifacts.best_reel_mp4.as_deref().unwrap());
    let info = probe_media("ffprobe", &reel).await.unwrap();
    assert!(info.has_audio);
    assert!((info.duration.unwrap() - 4.0).abs() < 0.3);
}
