use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use tower::ServiceExt;

use enricher_core::testutil::{MockExtractor, found};

use crate::integration::common::{
    body_bytes, body_json, get, setup_test_app, setup_test_app_with, upload, upload_request,
    wait_for_status,
};

const ITEMS_CSV: &[u8] = b"SrNo,Item Code,Item Name\n1,C001,crocin\n2,C002,\n";

async fn delete(app: &crate::integration::common::TestApp, uri: &str) -> axum::response::Response {
    app.router
        .clone()
        .oneshot(Request::delete(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

#[tokio::test]
async fn health_returns_200() {
    let app = setup_test_app();

    let response = get(&app, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["jobs"], 0);
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = setup_test_app();

    let response = get(&app, "/api-docs/openapi.json").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert!(json["paths"]["/upload"].is_object());
}

#[tokio::test]
async fn csv_upload_completes_and_downloads() {
    let app = setup_test_app();

    let job_id = upload(&app, "items.csv", ITEMS_CSV).await;
    assert_eq!(job_id.len(), 8);

    let status = wait_for_status(&app, &job_id, "completed").await;
    assert_eq!(status["processed"], 2);
    assert_eq!(status["total"], 2);
    assert_eq!(status["progress_percentage"], 100.0);
    assert_eq!(status["file_name"], "items.csv");
    assert!(status["output_file"].as_str().unwrap().ends_with(".csv"));
    assert!(status.get("error").is_none());

    let response = get(&app, &format!("/download/{job_id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/csv");
    let disposition = response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.contains(&format!("amazon_results_{job_id}.csv")));

    let csv = String::from_utf8(body_bytes(response).await).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("SrNo,Item Code,Item Name,Title,Composition_on_amazon.in,Price"));
    assert!(lines[0].ends_with("Generic Name,Error"));
    assert!(lines[1].starts_with("1,C001,crocin,Crocin Advance,NA,NA"));
    assert_eq!(lines[2], format!("2,C002,{}", ",".repeat(18)));
}

#[tokio::test]
async fn upload_without_file_field_returns_400() {
    let app = setup_test_app();

    let response = app
        .router
        .clone()
        .oneshot(upload_request("attachment", "items.csv", ITEMS_CSV))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "invalid_input");
    assert!(app.registry.is_empty());
}

#[tokio::test]
async fn unsupported_file_type_returns_400() {
    let app = setup_test_app();

    let response = app
        .router
        .clone()
        .oneshot(upload_request("file", "items.pdf", b"%PDF-1.4"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "unsupported_file_type");
    assert!(app.registry.is_empty());
}

#[tokio::test]
async fn unknown_job_returns_404() {
    let app = setup_test_app();

    assert_eq!(
        get(&app, "/status/deadbeef").await.status(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        get(&app, "/download/deadbeef").await.status(),
        StatusCode::NOT_FOUND
    );

    let response = delete(&app, "/jobs/deadbeef").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "not_found");
}

#[tokio::test]
async fn download_before_completion_returns_409_and_cancel_fails_job() {
    let app = setup_test_app_with(
        MockExtractor::always(found("slow")).with_delay(Duration::from_secs(3600)),
    );
    let job_id = upload(&app, "items.csv", ITEMS_CSV).await;
    wait_for_status(&app, &job_id, "processing").await;

    let response = get(&app, &format!("/download/{job_id}")).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Results not ready");
    assert_eq!(json["status"], "processing");

    let response = delete(&app, &format!("/jobs/{job_id}")).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let status = wait_for_status(&app, &job_id, "failed").await;
    assert_eq!(status["error"], "Job cancelled");

    let response = delete(&app, &format!("/jobs/{job_id}")).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = get(&app, &format!("/download/{job_id}")).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["status"], "failed");
}

#[tokio::test]
async fn unreadable_spreadsheet_fails_job() {
    let app = setup_test_app();

    let job_id = upload(&app, "items.xlsx", b"definitely not a zip archive").await;

    let status = wait_for_status(&app, &job_id, "failed").await;
    assert_eq!(status["total"], 0);
    assert_eq!(status["processed"], 0);
    assert!(status["error"].as_str().unwrap().starts_with("Input error"));
}

#[tokio::test]
async fn jobs_list_includes_every_upload() {
    let app = setup_test_app();

    let first = upload(&app, "first.csv", ITEMS_CSV).await;
    let second = upload(&app, "second.csv", ITEMS_CSV).await;
    wait_for_status(&app, &first, "completed").await;
    wait_for_status(&app, &second, "completed").await;

    let response = get(&app, "/jobs").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let jobs = json.as_object().unwrap();
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[&first]["file_name"], "first.csv");
    assert_eq!(jobs[&second]["status"], "completed");
    assert_eq!(jobs[&second]["progress_percentage"], 100.0);
}
