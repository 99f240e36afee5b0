//! Job manager service.
//!
//! `JobManager` is the only entry point callers use: `submit` validates and
//! enqueues, `get`/`status` read snapshots, and one worker task started by
//! `start` processes jobs strictly one at a time in FIFO order.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn, Instrument};

use reel_media::fs_utils::{remove_dir_quietly, write_json_atomic};
use reel_models::{ArtifactPaths, Job, JobId, JobRequest, JobStatusResponse, SubmitResponse};
use reel_queue::{JobQueue, JobReceiver, JobStore};

use crate::config::WorkerConfig;
use crate::error::{SubmitError, WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::pipeline::JobPipeline;

/// Snapshot file written into a job's output directory.
pub const JOB_FILE: &str = "job.json";

/// Handle to the job manager. Cheap to clone; all clones share one queue,
/// one store and one worker.
#[derive(Clone)]
pub struct JobManager {
    inner: Arc<Inner>,
}

struct Inner {
    config: Arc<WorkerConfig>,
    store: JobStore,
    queue: JobQueue,
    receiver: Mutex<Option<JobReceiver>>,
    pipeline: JobPipeline,
}

impl JobManager {
    pub fn new(config: WorkerConfig) -> Self {
        let config = Arc::new(config);
        let (queue, receiver) = JobQueue::new(&config.queue);
        Self {
            inner: Arc::new(Inner {
                store: JobStore::new(config.queue.max_retained_jobs),
                queue,
                receiver: Mutex::new(Some(receiver)),
                pipeline: JobPipeline::new(Arc::clone(&config)),
                config,
            }),
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.inner.config
    }

    /// Spawn the worker task. Returns `None` if it is already running.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) -> Option<JoinHandle<()>> {
        let receiver = self
            .inner
            .receiver
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()?;

        let worker = Worker {
            config: Arc::clone(&self.inner.config),
            store: self.inner.store.clone(),
            pipeline: self.inner.pipeline.clone(),
        };
        info!("Starting reel worker");
        Some(tokio::spawn(worker.run(receiver)))
    }

    /// Validate `request`, create a queued job and enqueue it.
    ///
    /// Returns as soon as the job is queued; rendering happens later on the
    /// worker task.
    pub async fn submit(&self, request: JobRequest) -> Result<SubmitResponse, SubmitError> {
        request.validate()?;

        let mut id = JobId::new();
        while self.inner.store.get(&id).is_some() {
            id = JobId::new();
        }
        let job = Job::with_id(id, request);
        let response = SubmitResponse::from(&job);

        self.inner.store.insert(job.clone());
        persist(&self.inner.config, &job).await;

        if let Err(e) = self.inner.queue.enqueue(job.id.clone()) {
            warn!(job_id = %job.id, "Rejecting job: {}", e);
            self.inner.store.remove(&job.id);
            remove_dir_quietly(self.inner.config.output_dir(&job.id)).await;
            return Err(e.into());
        }

        metrics::record_submitted();
        info!(
            job_id = %job.id,
            mode = %job.request.mode,
            queued = self.inner.queue.len(),
            "Job submitted"
        );
        Ok(response)
    }

    /// Snapshot of a job.
    pub fn get(&self, id: &JobId) -> Option<Job> {
        self.inner.store.get(id)
    }

    pub fn status(&self, id: &JobId) -> Option<JobStatusResponse> {
        self.get(id).map(|job| JobStatusResponse::from(&job))
    }

    /// Jobs waiting for the worker.
    pub fn queue_depth(&self) -> usize {
        self.inner.queue.len()
    }

    /// Poll until the job is terminal. `None` if the job is unknown (or was
    /// evicted while waiting).
    pub async fn wait_for_terminal(&self, id: &JobId, poll: Duration) -> Option<Job> {
        loop {
            let job = self.get(id)?;
            if job.is_terminal() {
                return Some(job);
            }
            tokio::time::sleep(poll).await;
        }
    }
}

/// State owned by the worker task.
struct Worker {
    config: Arc<WorkerConfig>,
    store: JobStore,
    pipeline: JobPipeline,
}

impl Worker {
    async fn run(self, mut receiver: JobReceiver) {
        while let Some(id) = receiver.recv().await {
            self.process(id).await;
        }
        info!("Job queue closed, worker stopping");
    }

    async fn process(&self, id: JobId) {
        let job = match self.store.update(&id, |job| job.mark_processing().map(|_| job.clone())) {
            Ok(Ok(job)) => job,
            Ok(Err(e)) => {
                warn!(job_id = %id, "Skipping job: {}", e);
                return;
            }
            Err(e) => {
                warn!(job_id = %id, "Skipping job: {}", e);
                return;
            }
        };
        persist(&self.config, &job).await;

        let mode = job.request.mode.as_str();
        let logger = JobLogger::new(&job.id, mode);
        logger.log_start(&format!("{} reel", mode));
        let started = Instant::now();

        let result = self.execute(&job, &logger).await;

        if !self.config.keep_temp {
            remove_dir_quietly(self.config.temp_dir(&job.id)).await;
        }

        let elapsed = started.elapsed().as_secs_f64();
        let finished = match result {
            Ok(artifacts) => {
                logger.log_completion(&format!("{:.1}s", elapsed));
                metrics::record_finished("completed", mode, elapsed);
                self.store.update(&id, |job| job.complete(artifacts).map(|_| job.clone()))
            }
            Err(e) => {
                let message = e.to_string();
                logger.log_error(&message);
                metrics::record_finished("failed", mode, elapsed);
                self.store.update(&id, |job| job.fail(message).map(|_| job.clone()))
            }
        };

        match finished {
            Ok(Ok(job)) => persist(&self.config, &job).await,
            Ok(Err(e)) => warn!(job_id = %id, "Could not finish job: {}", e),
            Err(e) => debug!(job_id = %id, "Job evicted before finishing: {}", e),
        }
    }

    /// Run the pipeline on its own task so a panic fails only this job.
    async fn execute(&self, job: &Job, logger: &JobLogger) -> WorkerResult<ArtifactPaths> {
        let pipeline = self.pipeline.clone();
        let owned = job.clone();
        let mut handle = tokio::spawn(
            async move { pipeline.run(&owned).await }.instrument(logger.create_span()),
        );

        let joined = match self.config.job_timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    handle.abort();
                    return Err(WorkerError::Timeout(limit.as_secs()));
                }
            },
            None => handle.await,
        };

        joined.unwrap_or_else(|e| {
            Err(WorkerError::processing_failed(format!(
                "pipeline task ended: {}",
                e
            )))
        })
    }
}

/// Write `{"job": …}` to the job's output directory. Failures are logged only.
async fn persist(config: &WorkerConfig, job: &Job) {
    let path = config.output_dir(&job.id).join(JOB_FILE);
    let snapshot = serde_json::json!({ "job": job });
    if let Err(e) = write_json_atomic(&path, &snapshot).await {
        warn!(job_id = %job.id, path = %path.display(), "Failed to persist job snapshot: {}", e);
    }
}
