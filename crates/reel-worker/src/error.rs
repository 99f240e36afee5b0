//! Worker error types.

use thiserror::Error;

use reel_models::RequestError;

pub type WorkerResult<T> = Result<T, WorkerError>;

/// Errors that end a job. Each is terminal only for its own job.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("{0}")]
    Media(#[from] reel_media::MediaError),

    #[error("Job timed out after {0} seconds")]
    Timeout(u64),

    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

impl WorkerError {
    pub fn processing_failed(msg: impl Into<String>) -> Self {
        Self::ProcessingFailed(msg.into())
    }
}

/// Reasons `submit` refuses a request.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("Invalid request: {0}")]
    Invalid(#[from] RequestError),

    #[error("Queue error: {0}")]
    Queue(#[from] reel_queue::QueueError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_media::MediaError;

    #[test]
    fn test_media_error_message_passes_through() {
        let err: WorkerError = MediaError::download_failed("http://x/a.mp4: HTTP 404").into();
        assert_eq!(err.to_string(), "Download failed: http://x/a.mp4: HTTP 404");
    }

    #[test]
    fn test_submit_error_from_request_error() {
        let err: SubmitError = RequestError::NoSource.into();
        assert!(matches!(err, SubmitError::Invalid(RequestError::NoSource)));
    }
}
