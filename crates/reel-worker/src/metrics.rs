//! Job metrics.
//!
//! - Submission counter
//! - Finished-job counter by outcome
//! - Job duration histogram

use std::net::SocketAddr;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

// =============================================================================
// Metric Names
// =============================================================================

pub mod names {
    /// Jobs accepted by `submit`.
    pub const JOBS_SUBMITTED_TOTAL: &str = "reel_jobs_submitted_total";

    /// Jobs reaching a terminal state, by outcome.
    pub const JOBS_FINISHED_TOTAL: &str = "reel_jobs_finished_total";

    /// Wall time from dequeue to terminal state, in seconds.
    pub const JOB_DURATION_SECONDS: &str = "reel_job_duration_seconds";
}

// =============================================================================
// Recording Functions
// =============================================================================

pub fn record_submitted() {
    counter!(names::JOBS_SUBMITTED_TOTAL).increment(1);
}

/// Record a job reaching `completed` or `failed`.
pub fn record_finished(outcome: &str, mode: &str, elapsed_secs: f64) {
    counter!(
        names::JOBS_FINISHED_TOTAL,
        "outcome" => outcome.to_string()
    )
    .increment(1);

    histogram!(
        names::JOB_DURATION_SECONDS,
        "mode" => mode.to_string()
    )
    .record(elapsed_secs);
}

/// Install the Prometheus recorder and serve `/metrics` on `addr`.
pub fn init_prometheus(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names() {
        assert!(names::JOBS_SUBMITTED_TOTAL.starts_with("reel_"));
        assert!(names::JOBS_FINISHED_TOTAL.contains("finished"));
        assert!(names::JOB_DURATION_SECONDS.ends_with("_seconds"));
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_submitted();
        record_finished("completed", "single", 1.5);
    }
}
