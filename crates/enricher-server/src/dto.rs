use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use enricher_core::job::{JobSnapshot, JobSummary};

// ---------------------------------------------------------------------------
// Upload
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct UploadResponse {
    pub job_id: String,
    pub message: String,
}

/// Multipart form accepted by `POST /upload`.
#[allow(dead_code)]
#[derive(utoipa::ToSchema)]
pub struct UploadForm {
    /// CSV or XLSX file with an "Item Name" column.
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct JobStatusResponse {
    pub job_id: String,
    /// `processing`, `completed` or `failed`.
    pub status: String,
    pub processed: usize,
    pub total: usize,
    /// Absent until the row count is known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_percentage: Option<f64>,
    pub elapsed_seconds: f64,
    /// `HH:MM:SS`
    pub elapsed_formatted: String,
    pub start_time: DateTime<Utc>,
    pub file_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<JobSnapshot> for JobStatusResponse {
    fn from(s: JobSnapshot) -> Self {
        Self {
            job_id: s.job_id,
            status: s.status.to_string(),
            processed: s.processed,
            total: s.total,
            progress_percentage: s.progress_percentage,
            elapsed_seconds: s.elapsed_seconds,
            elapsed_formatted: s.elapsed_formatted,
            start_time: s.start_time,
            file_name: s.file_name,
            output_file: s.output_file.map(|p| p.display().to_string()),
            error: s.error,
        }
    }
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct JobSummaryResponse {
    pub status: String,
    pub file_name: String,
    pub processed: usize,
    pub total: usize,
    pub progress_percentage: f64,
    pub start_time: DateTime<Utc>,
}

impl From<JobSummary> for JobSummaryResponse {
    fn from(s: JobSummary) -> Self {
        Self {
            status: s.status.to_string(),
            file_name: s.file_name,
            processed: s.processed,
            total: s.total,
            progress_percentage: s.progress_percentage,
            start_time: s.start_time,
        }
    }
}

/// Every known job, keyed by id.
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(transparent)]
pub struct JobListResponse(pub BTreeMap<String, JobSummaryResponse>);

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CancelResponse {
    pub job_id: String,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Download
// ---------------------------------------------------------------------------

/// Returned with 409 when a job has no result file yet.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct NotReadyResponse {
    pub error: String,
    pub status: String,
    pub processed: usize,
    pub total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_percentage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_error: Option<String>,
}

impl From<JobSnapshot> for NotReadyResponse {
    fn from(s: JobSnapshot) -> Self {
        Self {
            error: "Results not ready".to_string(),
            status: s.status.to_string(),
            processed: s.processed,
            total: s.total,
            progress_percentage: s.progress_percentage,
            job_error: s.error,
        }
    }
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Jobs known to this process, finished ones included.
    pub jobs: usize,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
