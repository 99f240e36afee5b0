//! Structured job logging utilities.
//!
//! Consistent lifecycle logging for reel jobs, carrying the job id and the
//! operation (`single` or `montage`) on every event.

use reel_models::JobId;
use tracing::{error, info, warn, Span};

/// Job logger for structured logging with consistent formatting.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    operation: String,
}

impl JobLogger {
    /// Create a new job logger for a specific job and operation.
    ///
    /// # Arguments
    /// * `job_id` - The job being processed
    /// * `operation` - The reel mode or pipeline step (e.g. "single", "montage")
    pub fn new(job_id: &JobId, operation: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job failed: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            "Job completed: {}", message
        );
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Span wrapping all work done for this job, including FFmpeg runs.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "job",
            job_id = %self.job_id,
            operation = %self.operation
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_logger_creation() {
        let job_id = JobId::new();
        let logger = JobLogger::new(&job_id, "montage");

        assert_eq!(logger.job_id(), job_id.as_str());
        assert_eq!(logger.operation(), "montage");
    }

    #[test]
    fn test_job_span_carries_ids() {
        let job_id = JobId::from_string("r_abcdef0123");
        let logger = JobLogger::new(&job_id, "single");
        let span = logger.create_span();
        let _entered = span.enter();

        logger.log_warning("motion scoring unavailable, cutting from the start");
        assert_eq!(logger.job_id(), "r_abcdef0123");
        assert_eq!(logger.operation(), "single");
    }
}
