//! FIFO job queue over a tokio channel.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use reel_models::JobId;

use crate::error::{QueueError, QueueResult};

/// Default number of finished jobs kept in memory.
pub const DEFAULT_MAX_RETAINED_JOBS: usize = 1000;

/// Queue configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// Maximum number of waiting jobs; `None` is unbounded
    pub max_queue_depth: Option<usize>,
    /// Finished jobs kept before the oldest are evicted
    pub max_retained_jobs: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_queue_depth: None,
            max_retained_jobs: DEFAULT_MAX_RETAINED_JOBS,
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            max_queue_depth: std::env::var("REEL_MAX_QUEUE_DEPTH")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|d: &usize| *d > 0),
            max_retained_jobs: std::env::var("REEL_MAX_RETAINED_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_MAX_RETAINED_JOBS),
        }
    }
}

/// Producer side of the queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct JobQueue {
    tx: mpsc::UnboundedSender<JobId>,
    depth: Arc<AtomicUsize>,
    max_depth: Option<usize>,
}

/// Consumer side of the queue, owned by the single worker task.
#[derive(Debug)]
pub struct JobReceiver {
    rx: mpsc::UnboundedReceiver<JobId>,
    depth: Arc<AtomicUsize>,
}

impl JobQueue {
    /// Create a queue and its receiver.
    pub fn new(config: &QueueConfig) -> (Self, JobReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let depth = Arc::new(AtomicUsize::new(0));
        (
            Self {
                tx,
                depth: Arc::clone(&depth),
                max_depth: config.max_queue_depth,
            },
            JobReceiver { rx, depth },
        )
    }

    /// Append a job id. Never blocks; fails only when a depth bound is
    /// configured and reached, or the receiver is gone.
    pub fn enqueue(&self, id: JobId) -> QueueResult<()> {
        let reserved = self
            .depth
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |d| match self.max_depth {
                Some(max) if d >= max => None,
                _ => Some(d + 1),
            });
        if let Err(current) = reserved {
            return Err(QueueError::QueueFull(current));
        }

        if self.tx.send(id).is_err() {
            self.depth.fetch_sub(1, Ordering::SeqCst);
            return Err(QueueError::Closed);
        }
        debug!(depth = self.len(), "Job enqueued");
        Ok(())
    }

    /// Number of jobs waiting.
    pub fn len(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl JobReceiver {
    /// Wait for the next job id. `None` once every producer is dropped and
    /// the queue is drained.
    pub async fn recv(&mut self) -> Option<JobId> {
        let id = self.rx.recv().await?;
        self.depth.fetch_sub(1, Ordering::SeqCst);
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fifo_order() {
        let (queue, mut rx) = JobQueue::new(&QueueConfig::default());
        let ids: Vec<JobId> = (0..5).map(|_| JobId::new()).collect();
        for id in &ids {
            queue.enqueue(id.clone()).unwrap();
        }
        assert_eq!(queue.len(), 5);

        for id in &ids {
            assert_eq!(rx.recv().await.as_ref(), Some(id));
        }
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_depth_bound() {
        let config = QueueConfig {
            max_queue_depth: Some(2),
            ..Default::default()
        };
        let (queue, mut rx) = JobQueue::new(&config);
        queue.enqueue(JobId::new()).unwrap();
        queue.enqueue(JobId::new()).unwrap();
        assert_eq!(queue.enqueue(JobId::new()), Err(QueueError::QueueFull(2)));

        rx.recv().await.unwrap();
        queue.enqueue(JobId::new()).unwrap();
    }

    #[tokio::test]
    async fn test_closed_receiver() {
        let (queue, rx) = JobQueue::new(&QueueConfig::default());
        drop(rx);
        assert_eq!(queue.enqueue(JobId::new()), Err(QueueError::Closed));
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_recv_ends_when_producers_dropped() {
        let (queue, mut rx) = JobQueue::new(&QueueConfig::default());
        let id = JobId::new();
        queue.enqueue(id.clone()).unwrap();
        drop(queue);
        assert_eq!(rx.recv().await, Some(id));
        assert_eq!(rx.recv().await, None);
    }

    #[test]
    fn test_default_config() {
        let config = QueueConfig::default();
        assert_eq!(config.max_queue_depth, None);
        assert_eq!(config.max_retained_jobs, 1000);
    }
}
