//! Keyed in-memory job store.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use reel_models::{Job, JobId};

use crate::error::{QueueError, QueueResult};

/// Shared map of jobs by id.
///
/// Reads clone a snapshot; the worker is the only writer after a job is
/// inserted. Finished jobs beyond `max_retained` are evicted oldest first;
/// queued and processing jobs are never evicted.
#[derive(Debug, Clone)]
pub struct JobStore {
    jobs: Arc<RwLock<HashMap<JobId, Job>>>,
    max_retained: usize,
}

impl JobStore {
    pub fn new(max_retained: usize) -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            max_retained,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<JobId, Job>> {
        self.jobs.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<JobId, Job>> {
        self.jobs.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert a new job.
    pub fn insert(&self, job: Job) {
        let mut jobs = self.write();
        jobs.insert(job.id.clone(), job);
        self.evict(&mut jobs);
    }

    /// Snapshot of a job.
    pub fn get(&self, id: &JobId) -> Option<Job> {
        self.read().get(id).cloned()
    }

    /// Remove a job outright.
    pub fn remove(&self, id: &JobId) -> Option<Job> {
        self.write().remove(id)
    }

    /// Mutate a job in place and return the closure's result.
    pub fn update<R>(&self, id: &JobId, f: impl FnOnce(&mut Job) -> R) -> QueueResult<R> {
        let mut jobs = self.write();
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| QueueError::job_not_found(id.as_str()))?;
        let result = f(job);
        let finished = job.is_terminal();
        if finished {
            self.evict(&mut jobs);
        }
        Ok(result)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn evict(&self, jobs: &mut HashMap<JobId, Job>) {
        let terminal = jobs.values().filter(|j| j.is_terminal()).count();
        if terminal <= self.max_retained {
            return;
        }

        let mut finished: Vec<_> = jobs
            .values()
            .filter(|j| j.is_terminal())
            .map(|j| (j.updated_at, j.created_at, j.id.clone()))
            .collect();
        finished.sort_by_key(|(updated, created, _)| (*updated, *created));

        for (_, _, id) in finished.into_iter().take(terminal - self.max_retained) {
            debug!(job_id = %id, "Evicting finished job");
            jobs.remove(&id);
        }
    }
}
