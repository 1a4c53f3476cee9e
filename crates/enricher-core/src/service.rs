//! Submission and query facade over the registry and a job runner.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::AppError;
use crate::job::{JobSnapshot, JobStatus, JobSummary, new_job_id};
use crate::models::TableFormat;
use crate::registry::{CancelOutcome, JobRegistry};
use crate::scheduler::{JobRunner, Submission};

/// Attempts at minting an unused job id before giving up.
const MAX_ID_ATTEMPTS: usize = 8;

/// Result file lookup for a job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutput {
    Ready {
        path: PathBuf,
        format: TableFormat,
    },
    /// Job exists but has no result file (still processing or failed).
    NotReady(JobSnapshot),
    NotFound,
}

#[derive(Clone)]
pub struct JobService {
    registry: JobRegistry,
    runner: Arc<dyn JobRunner>,
}

impl JobService {
    pub fn new(registry: JobRegistry, runner: Arc<dyn JobRunner>) -> Self {
        Self { registry, runner }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Accept an upload already saved at `input_path` and start processing it.
    ///
    /// Returns the new job id as soon as the job is registered.
    pub fn submit(&self, file_name: &str, input_path: &Path) -> Result<String, AppError> {
        let format = TableFormat::from_file_name(file_name)?;

        let mut attempts = 0;
        let (job_id, cancel) = loop {
            attempts += 1;
            let job_id = new_job_id();
            match self.registry.create(&job_id, file_name) {
                Ok(cancel) => break (job_id, cancel),
                Err(AppError::DuplicateJob(_)) if attempts < MAX_ID_ATTEMPTS => continue,
                Err(e) => return Err(e),
            }
        };

        tracing::info!(%job_id, %file_name, %format, "Job accepted");
        self.runner.spawn(Submission {
            job_id: job_id.clone(),
            file_name: file_name.to_string(),
            input_path: input_path.to_path_buf(),
            format,
            remove_input: true,
            cancel,
        });
        Ok(job_id)
    }

    pub fn status(&self, job_id: &str) -> Result<JobSnapshot, AppError> {
        self.registry
            .snapshot(job_id)
            .ok_or_else(|| AppError::JobNotFound(job_id.to_string()))
    }

    pub fn list(&self) -> BTreeMap<String, JobSummary> {
        self.registry.list()
    }

    pub fn cancel(&self, job_id: &str) -> CancelOutcome {
        let outcome = self.registry.cancel(job_id);
        tracing::info!(%job_id, ?outcome, "Cancellation requested");
        outcome
    }

    /// Locate a job's result file.
    ///
    /// A completed job whose file has since disappeared is reported as
    /// `NotFound`.
    pub fn output(&self, job_id: &str) -> JobOutput {
        let Some(snapshot) = self.registry.snapshot(job_id) else {
            return JobOutput::NotFound;
        };

        match (&snapshot.status, &snapshot.output_file) {
            (JobStatus::Completed, Some(path)) => {
                if !path.is_file() {
                    tracing::warn!(%job_id, path = %path.display(), "Result file missing");
                    return JobOutput::NotFound;
                }
                match TableFormat::from_file_name(&path.to_string_lossy()) {
                    Ok(format) => JobOutput::Ready {
                        path: path.clone(),
                        format,
                    },
                    Err(_) => JobOutput::NotFound,
                }
            }
            _ => JobOutput::NotReady(snapshot),
        }
    }
}
