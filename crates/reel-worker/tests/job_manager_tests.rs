//! Job manager tests that need no FFmpeg.

mod common;

use std::collections::HashSet;
use std::time::Duration;

use reel_models::{ArtifactPaths, JobRequest, JobStatus, RequestError};
use reel_worker::{JobManager, SubmitError, WorkerConfig};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_unreachable_url_fails_with_message() {
    let root = TempDir::new().unwrap();
    let manager = common::manager(&root);

    let job = common::run(&manager, JobRequest::for_video("http://127.0.0.1:9/clip.mp4")).await;

    assert_eq!(job.status, JobStatus::Failed);
    let error = job.error.expect("failed job carries a message");
    assert!(error.contains("Download failed"), "unexpected error: {}", error);
    assert_eq!(job.artifacts, ArtifactPaths::default());
}

#[tokio::test]
async fn test_http_error_status_fails_job() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing.mp4"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let root = TempDir::new().unwrap();
    let manager = common::manager(&root);
    let request = JobRequest::for_video(format!("{}/missing.mp4", server.uri()));
    let job = common::run(&manager, request).await;

    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error.unwrap().contains("404"));

    let snapshot = manager.config().output_dir(&job.id).join("job.json");
    let value: serde_json::Value =
        serde_json::from_slice(&std::fs::read(snapshot).unwrap()).unwrap();
    assert_eq!(value["job"]["status"], "failed");
}

#[tokio::test]
async fn test_validation_rejects_synchronously() {
    let root = TempDir::new().unwrap();
    let manager = common::manager(&root);

    let request = JobRequest {
        crossfade_sec: Some(5.0),
        ..JobRequest::montage(["a.mp4", "b.mp4"])
    };
    let err = manager.submit(request).await.unwrap_err();
    assert!(matches!(err, SubmitError::Invalid(RequestError::InvalidCrossfade { .. })));

    let err = manager.submit(JobRequest::default()).await.unwrap_err();
    assert!(matches!(err, SubmitError::Invalid(RequestError::NoSource)));
    assert_eq!(manager.queue_depth(), 0);
}

#[tokio::test]
async fn test_submit_returns_before_processing_finishes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow.mp4"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let root = TempDir::new().unwrap();
    let manager = common::manager(&root);

    let response = manager
        .submit(JobRequest::for_video(format!("{}/slow.mp4", server.uri())))
        .await
        .unwrap();
    assert_eq!(response.status, JobStatus::Queued);

    let status = manager.status(&response.job_id).unwrap();
    assert!(!status.status.is_terminal());

    let job = manager
        .wait_for_terminal(&response.job_id, Duration::from_millis(20))
        .await
        .unwrap();
    // An empty body is not a video, with or without FFmpeg installed
    assert_eq!(job.status, JobStatus::Failed);
}

#[tokio::test]
async fn test_concurrent_duplicate_submissions() {
    let root = TempDir::new().unwrap();
    let manager = JobManager::new(WorkerConfig::default().with_uploads_root(root.path()));

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let manager = manager.clone();
            tokio::spawn(async move { manager.submit(JobRequest::for_video("same.mp4")).await })
        })
        .collect();

    let mut ids = HashSet::new();
    let mut dirs = HashSet::new();
    for handle in handles {
        let response = handle.await.unwrap().unwrap();
        let dir = manager.config().output_dir(&response.job_id);
        assert!(dir.join("job.json").exists());
        dirs.insert(dir);
        ids.insert(response.job_id);
    }

    assert_eq!(ids.len(), 16);
    assert_eq!(dirs.len(), 16);
    assert_eq!(manager.queue_depth(), 16);
}

#[tokio::test]
async fn test_jobs_run_in_submission_order() {
    let root = TempDir::new().unwrap();
    let manager = common::manager(&root);

    let first = manager.submit(JobRequest::for_video("/missing/first.mp4")).await.unwrap();
    let second = manager.submit(JobRequest::for_video("/missing/second.mp4")).await.unwrap();

    let second = manager
        .wait_for_terminal(&second.job_id, Duration::from_millis(10))
        .await
        .unwrap();
    let first = manager.get(&first.job_id).unwrap();

    assert!(first.is_terminal());
    assert!(first.updated_at <= second.updated_at);
}
