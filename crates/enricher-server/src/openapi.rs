use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Catalog Enricher API",
        version = "0.1.0",
        description = "Upload a CSV/XLSX list of items and download it enriched with catalog data."
    ),
    paths(
        crate::routes::upload,
        crate::routes::job_status,
        crate::routes::list_jobs,
        crate::routes::cancel_job,
        crate::routes::download,
        crate::routes::health,
    ),
    components(schemas(
        crate::dto::UploadForm,
        crate::dto::UploadResponse,
        crate::dto::JobStatusResponse,
        crate::dto::JobSummaryResponse,
        crate::dto::JobListResponse,
        crate::dto::CancelResponse,
        crate::dto::NotReadyResponse,
        crate::dto::HealthResponse,
        crate::dto::ErrorResponse,
    )),
    tags(
        (name = "jobs", description = "Enrichment job submission and results"),
        (name = "system", description = "Health and system status"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/upload",
            "/status/{job_id}",
            "/jobs",
            "/jobs/{job_id}",
            "/download/{job_id}",
            "/health",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
