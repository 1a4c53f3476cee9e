use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of an enrichment job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            _ => Err(format!("Unknown job status: {}", s)),
        }
    }
}

/// Mint a short job identifier (first segment of a v4 UUID).
pub fn new_job_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Canonical job record, owned by the registry.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub file_name: String,
    pub status: JobStatus,
    pub processed: usize,
    pub total: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub output_location: Option<PathBuf>,
    pub error: Option<String>,
}

impl Job {
    pub fn new(id: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            file_name: file_name.into(),
            status: JobStatus::Processing,
            processed: 0,
            total: 0,
            started_at: Utc::now(),
            finished_at: None,
            output_location: None,
            error: None,
        }
    }

    /// Progress in percent, undefined until the total is known.
    pub fn progress_percentage(&self) -> Option<f64> {
        if self.total == 0 {
            return None;
        }
        Some(self.processed as f64 / self.total as f64 * 100.0)
    }

    /// Time since start, frozen once the job reaches a terminal state.
    pub fn elapsed_at(&self, now: DateTime<Utc>) -> Duration {
        let end = self.finished_at.unwrap_or(now);
        (end - self.started_at).to_std().unwrap_or_default()
    }

    pub fn snapshot_at(&self, now: DateTime<Utc>) -> JobSnapshot {
        let elapsed = self.elapsed_at(now);
        JobSnapshot {
            job_id: self.id.clone(),
            status: self.status,
            processed: self.processed,
            total: self.total,
            progress_percentage: self.progress_percentage(),
            elapsed_seconds: elapsed.as_secs_f64(),
            elapsed_formatted: format_elapsed(elapsed),
            start_time: self.started_at,
            file_name: self.file_name.clone(),
            output_file: self.output_location.clone(),
            error: self.error.clone(),
        }
    }

    pub fn summary(&self) -> JobSummary {
        JobSummary {
            status: self.status,
            file_name: self.file_name.clone(),
            processed: self.processed,
            total: self.total,
            progress_percentage: self.progress_percentage().unwrap_or(0.0),
            start_time: self.started_at,
        }
    }
}

/// Point-in-time copy of a job with derived fields computed at read time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSnapshot {
    pub job_id: String,
    pub status: JobStatus,
    pub processed: usize,
    pub total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_percentage: Option<f64>,
    pub elapsed_seconds: f64,
    pub elapsed_formatted: String,
    pub start_time: DateTime<Utc>,
    pub file_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Compact per-job entry for the job listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSummary {
    pub status: JobStatus,
    pub file_name: String,
    pub processed: usize,
    pub total: usize,
    pub progress_percentage: f64,
    pub start_time: DateTime<Utc>,
}

/// Format a duration as `HH:MM:SS`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;

    use super::*;

    #[test]
    fn test_job_status_roundtrip() {
        for status in [JobStatus::Processing, JobStatus::Completed, JobStatus::Failed] {
            let parsed: JobStatus = status.as_str().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn test_terminal_states() {
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn test_new_job_id_shape() {
        let id = new_job_id();
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(new_job_id(), new_job_id());
    }

    #[test]
    fn test_progress_undefined_without_total() {
        let mut job = Job::new("abc", "items.csv");
        assert_eq!(job.progress_percentage(), None);

        job.total = 4;
        job.processed = 1;
        assert_eq!(job.progress_percentage(), Some(25.0));
    }

    #[test]
    fn test_elapsed_freezes_when_finished() {
        let mut job = Job::new("abc", "items.csv");
        job.finished_at = Some(job.started_at + TimeDelta::seconds(90));

        let later = job.started_at + TimeDelta::hours(2);
        assert_eq!(job.elapsed_at(later), Duration::from_secs(90));
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::from_secs(0)), "00:00:00");
        assert_eq!(format_elapsed(Duration::from_secs(3_725)), "01:02:05");
    }

    #[test]
    fn test_snapshot_serialization_omits_unset_fields() {
        let job = Job::new("abc", "items.csv");
        let json = serde_json::to_value(job.snapshot_at(job.started_at)).unwrap();
        assert_eq!(json["status"], "processing");
        assert!(json.get("progress_percentage").is_none());
        assert!(json.get("output_file").is_none());
        assert!(json.get("error").is_none());
    }
}
