//! In-memory job registry shared between schedulers and status readers.
//!
//! The registry is the single source of truth for job progress. Every
//! operation takes the lock once, so each call sees and leaves a consistent
//! view. The lock is never held across an `.await`.
//!
//! Mutations on unknown or already-terminal jobs are silently ignored: the
//! scheduler run that owns a job is its only writer, and a late write after
//! a terminal transition must not resurrect it.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::error::AppError;
use crate::job::{Job, JobSnapshot, JobStatus, JobSummary};

struct Entry {
    job: Job,
    cancel: CancellationToken,
}

/// Outcome of a cancellation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    Requested,
    AlreadyFinished,
    NotFound,
}

/// Cheaply cloneable handle to the process-wide job table.
#[derive(Clone, Default)]
pub struct JobRegistry {
    jobs: Arc<RwLock<HashMap<String, Entry>>>,
    /// Parent of every per-job token; cancelled on shutdown.
    root: CancellationToken,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Entry>> {
        self.jobs.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Entry>> {
        self.jobs.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a new job in `Processing` state with `total = 0`.
    ///
    /// Returns the job's cancellation token.
    pub fn create(&self, job_id: &str, file_name: &str) -> Result<CancellationToken, AppError> {
        let mut jobs = self.write();
        if jobs.contains_key(job_id) {
            return Err(AppError::DuplicateJob(job_id.to_string()));
        }

        let cancel = self.root.child_token();
        jobs.insert(
            job_id.to_string(),
            Entry {
                job: Job::new(job_id, file_name),
                cancel: cancel.clone(),
            },
        );
        tracing::debug!(%job_id, %file_name, "Job registered");
        Ok(cancel)
    }

    /// Apply `f` to a job that exists and is still processing.
    fn update(&self, job_id: &str, f: impl FnOnce(&mut Job)) {
        let mut jobs = self.write();
        match jobs.get_mut(job_id) {
            Some(entry) if !entry.job.status.is_terminal() => f(&mut entry.job),
            Some(_) => tracing::debug!(%job_id, "Ignoring update to finished job"),
            None => tracing::debug!(%job_id, "Ignoring update to unknown job"),
        }
    }

    pub fn set_total(&self, job_id: &str, total: usize) {
        self.update(job_id, |job| {
            job.total = total;
            job.processed = job.processed.min(total);
        });
    }

    /// Advance the processed count by one row.
    pub fn advance(&self, job_id: &str) {
        self.advance_by(job_id, 1);
    }

    /// Advance the processed count, never past a known total.
    pub fn advance_by(&self, job_id: &str, delta: usize) {
        self.update(job_id, |job| {
            let next = job.processed + delta;
            job.processed = if job.total > 0 {
                next.min(job.total)
            } else {
                next
            };
        });
    }

    pub fn complete(&self, job_id: &str, output_location: PathBuf) {
        self.update(job_id, |job| {
            job.status = JobStatus::Completed;
            job.output_location = Some(output_location);
            job.finished_at = Some(Utc::now());
        });
    }

    pub fn fail(&self, job_id: &str, error: impl Into<String>) {
        let error = error.into();
        self.update(job_id, |job| {
            job.status = JobStatus::Failed;
            job.error = Some(error);
            job.finished_at = Some(Utc::now());
        });
    }

    /// Point-in-time copy of a job, or `None` if the id is unknown.
    pub fn snapshot(&self, job_id: &str) -> Option<JobSnapshot> {
        let now = Utc::now();
        self.read().get(job_id).map(|e| e.job.snapshot_at(now))
    }

    /// Summaries of every job, keyed by id.
    pub fn list(&self) -> BTreeMap<String, JobSummary> {
        self.read()
            .iter()
            .map(|(id, e)| (id.clone(), e.job.summary()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Request cancellation of a running job.
    ///
    /// The scheduler observes the token at its next suspension point and
    /// marks the job failed.
    pub fn cancel(&self, job_id: &str) -> CancelOutcome {
        let jobs = self.read();
        match jobs.get(job_id) {
            Some(entry) if entry.job.status.is_terminal() => CancelOutcome::AlreadyFinished,
            Some(entry) => {
                entry.cancel.cancel();
                CancelOutcome::Requested
            }
            None => CancelOutcome::NotFound,
        }
    }

    /// Cancel every running job (process shutdown).
    pub fn shutdown(&self) {
        self.root.cancel();
    }
}
