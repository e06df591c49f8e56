//! Job registry: the single source of truth for job status and results
//!
//! Entries are created at submission and never removed. Job state is not
//! stored here; it is read live from the attached `TaskHandle` on every
//! query. Waiting for a result happens on a cloned handle, outside the map
//! lock, so slow jobs never block other readers or writers.

use crate::jobs::job::{JobId, JobState, JobStatus};
use crate::jobs::pool::{TaskHandle, TaskOutcome, WorkerId};
use crate::{JobError, JobResult};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug)]
struct JobEntry {
    input_urls: Vec<String>,
    handle: Option<TaskHandle>,
    worker: Option<WorkerId>,
    submitted_at: DateTime<Utc>,
}

impl JobEntry {
    fn new(input_urls: Vec<String>) -> Self {
        Self {
            input_urls,
            handle: None,
            worker: None,
            submitted_at: Utc::now(),
        }
    }

    fn snapshot(&self, job_id: JobId) -> JobStatus {
        let state = self
            .handle
            .as_ref()
            .map(TaskHandle::state)
            .unwrap_or(JobState::Pending);

        let error = match self.handle.as_ref().and_then(TaskHandle::outcome) {
            Some(TaskOutcome::Failed(message)) => Some(message),
            _ => None,
        };

        JobStatus {
            job_id,
            state,
            input_urls: self.input_urls.clone(),
            worker: self.worker,
            submitted_at: self.submitted_at,
            error,
        }
    }
}

/// Concurrent map from job identifier to job entry
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<JobId, JobEntry>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a pending entry for `id`
    pub async fn create(&self, id: JobId, input_urls: Vec<String>) -> JobResult<()> {
        let mut jobs = self.jobs.write().await;

        if jobs.contains_key(&id) {
            return Err(JobError::DuplicateKey(id));
        }

        jobs.insert(id, JobEntry::new(input_urls));
        tracing::debug!("Registered job {}", id);
        Ok(())
    }

    /// Records the worker pool handle for `id`, replacing any previous one
    pub async fn attach_handle(&self, id: JobId, handle: TaskHandle) -> JobResult<()> {
        let mut jobs = self.jobs.write().await;
        let entry = jobs.get_mut(&id).ok_or(JobError::NotFound(id))?;
        entry.handle = Some(handle);
        Ok(())
    }

    /// Records which execution unit picked up `id`
    pub async fn attach_worker(&self, id: JobId, worker: WorkerId) -> JobResult<()> {
        let mut jobs = self.jobs.write().await;
        let entry = jobs.get_mut(&id).ok_or(JobError::NotFound(id))?;
        entry.worker = Some(worker);
        Ok(())
    }

    /// Returns the current status of `id`
    pub async fn status(&self, id: JobId) -> JobResult<JobStatus> {
        let jobs = self.jobs.read().await;
        jobs.get(&id)
            .map(|entry| entry.snapshot(id))
            .ok_or(JobError::NotFound(id))
    }

    /// Waits for `id` to finish and returns its image URLs
    ///
    /// Returns `TaskFailed` with the task's error if the job failed. Repeated
    /// calls on a finished job return the same payload.
    pub async fn result(&self, id: JobId) -> JobResult<Arc<Vec<String>>> {
        let handle = {
            let jobs = self.jobs.read().await;
            let entry = jobs.get(&id).ok_or(JobError::NotFound(id))?;
            entry.handle.clone().ok_or(JobError::NoHandle(id))?
        };

        match handle.result().await {
            TaskOutcome::Completed(images) => Ok(images),
            TaskOutcome::Failed(message) => Err(JobError::TaskFailed { id, message }),
        }
    }

    /// Number of jobs ever registered
    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}
