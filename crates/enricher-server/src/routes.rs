use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;

use enricher_core::error::AppError;
use enricher_core::models::TableFormat;
use enricher_core::registry::CancelOutcome;
use enricher_core::service::JobOutput;

use crate::dto::{
    CancelResponse, ErrorResponse, HealthResponse, JobListResponse, JobStatusResponse,
    NotReadyResponse, UploadResponse,
};
use crate::error::ApiError;
use crate::openapi::ApiDoc;
use crate::state::AppState;

/// Build the full router with all routes and middleware.
pub fn router(state: Arc<AppState>) -> Router {
    let upload_limit = state.max_upload_bytes;

    Router::new()
        .route("/upload", post(upload))
        .route("/status/{job_id}", get(job_status))
        .route("/jobs", get(list_jobs))
        .route("/jobs/{job_id}", delete(cancel_job))
        .route("/download/{job_id}", get(download))
        .route("/health", get(health))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::max(upload_limit))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Upload
// ---------------------------------------------------------------------------

#[utoipa::path(
    post,
    path = "/upload",
    request_body(content = crate::dto::UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 202, description = "Job accepted", body = UploadResponse),
        (status = 400, description = "Missing file or unsupported type", body = ErrorResponse),
    ),
    tag = "jobs"
)]
pub async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InputError(format!("Malformed multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::InputError(format!("Failed to read upload: {e}")))?;
        upload = Some((file_name, bytes));
        break;
    }

    let (file_name, bytes) =
        upload.ok_or_else(|| AppError::InputError("No file uploaded".to_string()))?;
    let format = TableFormat::from_file_name(&file_name)?;

    let path = stage_upload(&state, format, &bytes).await?;
    let job_id = match state.service.submit(&file_name, &path) {
        Ok(id) => id,
        Err(e) => {
            let _ = tokio::fs::remove_file(&path).await;
            return Err(e.into());
        }
    };

    let response = UploadResponse {
        job_id,
        message: "File uploaded successfully. Processing started.".to_string(),
    };
    Ok((StatusCode::ACCEPTED, axum::Json(response)))
}

/// Save an upload where its job can read it.
async fn stage_upload(
    state: &AppState,
    format: TableFormat,
    bytes: &[u8],
) -> Result<PathBuf, AppError> {
    tokio::fs::create_dir_all(&state.upload_dir).await?;
    let path = state
        .upload_dir
        .join(format!("upload-{}.{}", Uuid::new_v4().simple(), format.extension()));
    tokio::fs::write(&path, bytes).await?;
    Ok(path)
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/status/{job_id}",
    params(("job_id" = String, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Job progress", body = JobStatusResponse),
        (status = 404, description = "Job not found", body = ErrorResponse),
    ),
    tag = "jobs"
)]
pub async fn job_status(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let snapshot = state.service.status(&job_id)?;
    Ok(axum::Json(JobStatusResponse::from(snapshot)))
}

#[utoipa::path(
    get,
    path = "/jobs",
    responses(
        (status = 200, description = "All jobs keyed by ID", body = JobListResponse),
    ),
    tag = "jobs"
)]
pub async fn list_jobs(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let jobs = state
        .service
        .list()
        .into_iter()
        .map(|(id, summary)| (id, summary.into()))
        .collect();
    axum::Json(JobListResponse(jobs))
}

#[utoipa::path(
    delete,
    path = "/jobs/{job_id}",
    params(("job_id" = String, Path, description = "Job ID")),
    responses(
        (status = 202, description = "Cancellation requested", body = CancelResponse),
        (status = 404, description = "Job not found", body = ErrorResponse),
        (status = 409, description = "Job already finished", body = ErrorResponse),
    ),
    tag = "jobs"
)]
pub async fn cancel_job(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Response, ApiError> {
    match state.service.cancel(&job_id) {
        CancelOutcome::Requested => {
            let body = CancelResponse {
                job_id,
                message: "Cancellation requested".to_string(),
            };
            Ok((StatusCode::ACCEPTED, axum::Json(body)).into_response())
        }
        CancelOutcome::AlreadyFinished => {
            let body = ErrorResponse {
                error: "conflict".to_string(),
                message: format!("Job {job_id} has already finished"),
            };
            Ok((StatusCode::CONFLICT, axum::Json(body)).into_response())
        }
        CancelOutcome::NotFound => Err(AppError::JobNotFound(job_id).into()),
    }
}

// ---------------------------------------------------------------------------
// Download
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/download/{job_id}",
    params(("job_id" = String, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Result file in the upload's format"),
        (status = 404, description = "Job or result file not found", body = ErrorResponse),
        (status = 409, description = "Job has no result file yet", body = NotReadyResponse),
    ),
    tag = "jobs"
)]
pub async fn download(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<Response, ApiError> {
    match state.service.output(&job_id) {
        JobOutput::Ready { path, format } => {
            let bytes = tokio::fs::read(&path).await.map_err(AppError::from)?;
            let disposition = format!(
                "attachment; filename=\"{}\"",
                state.source.download_name(&job_id, format)
            );
            Ok((
                [
                    (header::CONTENT_TYPE, format.content_type().to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                bytes,
            )
                .into_response())
        }
        JobOutput::NotReady(snapshot) => Ok((
            StatusCode::CONFLICT,
            axum::Json(NotReadyResponse::from(snapshot)),
        )
            .into_response()),
        JobOutput::NotFound => Err(AppError::JobNotFound(job_id).into()),
    }
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    ),
    tag = "system"
)]
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    axum::Json(HealthResponse {
        status: "healthy",
        jobs: state.service.registry().len(),
    })
}
