use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use enricher_client::TabularFiles;
use enricher_core::testutil::{MockExtractor, found};
use enricher_core::{
    BatchScheduler, CatalogSource, JobRegistry, JobService, OutputConfig, OutputStage,
    PacingConfig, SchedulerConfig,
};
use enricher_server::routes;
use enricher_server::state::AppState;

const BOUNDARY: &str = "enricher-test-boundary";

pub struct TestApp {
    pub router: Router,
    pub registry: JobRegistry,
    _output_dir: TempDir,
    _upload_dir: TempDir,
}

/// App whose catalog lookups succeed immediately.
pub fn setup_test_app() -> TestApp {
    setup_test_app_with(MockExtractor::always(found("Crocin Advance")))
}

pub fn setup_test_app_with(extractor: MockExtractor) -> TestApp {
    let output_dir = tempfile::tempdir().expect("Failed to create output dir");
    let upload_dir = tempfile::tempdir().expect("Failed to create upload dir");

    let registry = JobRegistry::new();
    let output = OutputStage::new(
        TabularFiles,
        OutputConfig {
            output_dir: output_dir.path().to_path_buf(),
            source: CatalogSource::default(),
        },
    );
    let scheduler = BatchScheduler::new(
        extractor,
        TabularFiles,
        output,
        registry.clone(),
        SchedulerConfig::default().with_pacing(PacingConfig::immediate()),
    );

    let state = Arc::new(AppState {
        service: JobService::new(registry.clone(), Arc::new(scheduler)),
        source: CatalogSource::default(),
        upload_dir: upload_dir.path().to_path_buf(),
        max_upload_bytes: 1024 * 1024,
    });

    TestApp {
        router: routes::router(state),
        registry,
        _output_dir: output_dir,
        _upload_dir: upload_dir,
    }
}

/// `POST /upload` with a single multipart field.
pub fn upload_request(field: &str, file_name: &str, content: &[u8]) -> Request<Body> {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::post("/upload")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub async fn get(app: &TestApp, uri: &str) -> Response<Body> {
    app.router
        .clone()
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

/// Upload `content` and return the new job id.
pub async fn upload(app: &TestApp, file_name: &str, content: &[u8]) -> String {
    let response = app
        .router
        .clone()
        .oneshot(upload_request("file", file_name, content))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    body_json(response).await["job_id"]
        .as_str()
        .unwrap()
        .to_string()
}

/// Poll `GET /status/{id}` until the job reports `status`.
pub async fn wait_for_status(app: &TestApp, job_id: &str, status: &str) -> serde_json::Value {
    for _ in 0..250 {
        let json = body_json(get(app, &format!("/status/{job_id}")).await).await;
        if json["status"] == status {
            return json;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("job {job_id} never reached status {status}");
}
