//! Reel jobs and their lifecycle.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::{ArtifactPaths, JobRequest};

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID (`r_` followed by 10 hex characters).
    pub fn new() -> Self {
        let hex = Uuid::new_v4().simple().to_string();
        Self(format!("r_{}", &hex[..10]))
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job processing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job is queued waiting for the worker
    #[default]
    Queued,
    /// Job is actively being processed
    Processing,
    /// Job completed successfully
    Completed,
    /// Job failed with an error
    Failed,
}

impl JobStatus {
    /// Get string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Processing)
                | (JobStatus::Queued, JobStatus::Failed)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Rejected status transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Illegal job transition for {job_id}: {from} -> {to}")]
pub struct TransitionError {
    pub job_id: JobId,
    pub from: JobStatus,
    pub to: JobStatus,
}

/// A reel job tracked by the job manager.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    /// Unique job ID
    pub id: JobId,

    /// Originating request
    pub request: JobRequest,

    /// Current status
    #[serde(default)]
    pub status: JobStatus,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,

    /// Error message (if failed)
    pub error: Option<String>,

    /// Rendered artifacts
    #[serde(default)]
    pub artifacts: ArtifactPaths,
}

impl Job {
    /// Create a new job in `queued` state.
    pub fn new(request: JobRequest) -> Self {
        Self::with_id(JobId::new(), request)
    }

    /// Create a new queued job with a known id.
    pub fn with_id(id: JobId, request: JobRequest) -> Self {
        let now = Utc::now();
        Self {
            id,
            request,
            status: JobStatus::Queued,
            created_at: now,
            updated_at: now,
            error: None,
            artifacts: ArtifactPaths::default(),
        }
    }

    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    fn transition(&mut self, next: JobStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError {
                job_id: self.id.clone(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        // Strictly increasing even when the clock has coarse resolution
        let now = Utc::now();
        self.updated_at = if now > self.updated_at {
            now
        } else {
            self.updated_at + chrono::Duration::microseconds(1)
        };
        Ok(())
    }

    /// Start processing the job.
    pub fn mark_processing(&mut self) -> Result<(), TransitionError> {
        self.transition(JobStatus::Processing)
    }

    /// Mark job as completed with its artifacts.
    pub fn complete(&mut self, artifacts: ArtifactPaths) -> Result<(), TransitionError> {
        self.transition(JobStatus::Completed)?;
        self.artifacts = artifacts;
        self.error = None;
        Ok(())
    }

    /// Mark job as failed with an error message.
    ///
    /// Failed jobs expose no partial artifacts.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), TransitionError> {
        self.transition(JobStatus::Failed)?;
        self.error = Some(error.into());
        self.artifacts = ArtifactPaths::default();
        Ok(())
    }
}

/// Response returned by `submit`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SubmitResponse {
    pub job_id: JobId,
    pub status: JobStatus,
}

impl From<&Job> for SubmitResponse {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id.clone(),
            status: job.status,
        }
    }
}

/// Response returned by `status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobStatusResponse {
    pub status: JobStatus,
    pub error: Option<String>,
    pub artifacts: ArtifactPaths,
}

impl From<&Job> for JobStatusResponse {
    fn from(job: &Job) -> Self {
        Self {
            status: job.status,
            error: job.error.clone(),
            artifacts: job.artifacts.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CandidateWindow;

    fn request() -> JobRequest {
        JobRequest::for_video("clip.mp4")
    }

    #[test]
    fn test_job_id_format() {
        let id = JobId::new();
        assert!(id.as_str().starts_with("r_"));
        assert_eq!(id.as_str().len(), 12);
        assert_ne!(JobId::new(), id);
    }

    #[test]
    fn test_job_creation() {
        let job = Job::new(request());
        assert_eq!(job.status, JobStatus::Queued);
        assert!(job.error.is_none());
        assert!(job.artifacts.best_reel_mp4.is_none());
        assert_eq!(job.created_at, job.updated_at);
    }

    #[test]
    fn test_job_state_transitions() {
        let mut job = Job::new(request());
        let created = job.updated_at;

        job.mark_processing().unwrap();
        assert_eq!(job.status, JobStatus::Processing);
        assert!(job.updated_at > created);

        let artifacts = ArtifactPaths {
            best_reel_mp4: Some("/photos/reels/x/reel.mp4".into()),
            alt_candidates: vec![CandidateWindow { start: 0.0, end: 5.0, score: 1.0 }],
            ..Default::default()
        };
        let processing_at = job.updated_at;
        job.complete(artifacts.clone()).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.artifacts, artifacts);
        assert!(job.updated_at > processing_at);
        assert!(job.is_terminal());
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut job = Job::new(request());
        job.mark_processing().unwrap();
        job.fail("boom").unwrap();
        assert_eq!(job.error.as_deref(), Some("boom"));

        assert!(job.complete(ArtifactPaths::default()).is_err());
        assert!(job.mark_processing().is_err());
        let err = job.fail("again").unwrap_err();
        assert_eq!(err.from, JobStatus::Failed);
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_queued_cannot_complete() {
        let mut job = Job::new(request());
        assert!(job.complete(ArtifactPaths::default()).is_err());
        assert_eq!(job.status, JobStatus::Queued);
        assert!(job.fail("no sources").is_ok());
    }

    #[test]
    fn test_status_wire_format() {
        assert_eq!(serde_json::to_string(&JobStatus::Processing).unwrap(), "\"processing\"");
        let job = Job::new(request());
        let submit = SubmitResponse::from(&job);
        let json = serde_json::to_value(&submit).unwrap();
        assert_eq!(json["status"], "queued");
        assert_eq!(json["job_id"], job.id.as_str());
    }
}
